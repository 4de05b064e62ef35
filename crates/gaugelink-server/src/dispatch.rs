//! Request dispatcher: maps decoded request objects to state reads or
//! outbound commands and produces the response frame.

use serde_json::{json, Value};
use tracing::debug;

use gaugelink_core::protocol::Response;

use crate::command::Command;
use crate::state::ServerState;

/// Decode one inbound text frame and dispatch it.
///
/// Decode failures become error responses on the same connection; they
/// never touch state or other connections.
pub async fn handle_frame(state: &ServerState, text: &str) -> Response {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return Response::error(format!("JSON parse error: {e}")),
    };

    let Some(request) = value.as_object() else {
        return Response::error("Request must be a JSON object");
    };

    let action = request.get("action").and_then(Value::as_str).unwrap_or("");
    debug!(action, "Dispatching request");

    match action {
        "getState" => handle_get_state(state).await,
        "getProperty" => handle_get_property(state, request).await,
        "setProperty" => handle_set_property(state, request),
        "listProperties" => handle_list_properties(state).await,
        "navigate" => handle_navigate(state, request),
        "ping" => handle_ping(state),
        _ => Response::error(format!("Unknown action: '{action}'")),
    }
}

/// Extract a required non-empty string field, treating non-strings as
/// missing.
fn required_str<'a>(request: &'a serde_json::Map<String, Value>, field: &str) -> Option<&'a str> {
    request
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

async fn handle_get_state(state: &ServerState) -> Response {
    let snapshot = state.snapshot().await;
    Response::ok(json!({
        "page": snapshot.page,
        "pageTitle": snapshot.page_title,
        "properties": snapshot.properties,
        "propertyMetadata": snapshot.property_metadata,
    }))
}

async fn handle_get_property(
    state: &ServerState,
    request: &serde_json::Map<String, Value>,
) -> Response {
    let Some(name) = required_str(request, "name") else {
        return Response::error("Missing 'name' parameter");
    };

    match state.get_property(name).await {
        Some(value) => Response::ok(json!({"name": name, "value": value})),
        None => Response::error(format!("Property '{name}' not found")),
    }
}

/// `setProperty` acknowledges receipt only: the command is forwarded to the
/// embedding application and the store is untouched until it calls back via
/// `update_property`. The response echoes the request's own inputs.
fn handle_set_property(state: &ServerState, request: &serde_json::Map<String, Value>) -> Response {
    let Some(name) = required_str(request, "name") else {
        return Response::error("Missing 'name' parameter");
    };
    let Some(value) = request.get("value") else {
        return Response::error("Missing 'value' parameter");
    };

    let _ = state.commands.send(Command::SetProperty {
        name: name.to_string(),
        value: value.clone(),
    });

    Response::ok(json!({"name": name, "value": value}))
}

async fn handle_list_properties(state: &ServerState) -> Response {
    let snapshot = state.snapshot().await;
    Response::ok(Value::Array(snapshot.property_metadata))
}

fn handle_navigate(state: &ServerState, request: &serde_json::Map<String, Value>) -> Response {
    let Some(page) = required_str(request, "page") else {
        return Response::error("Missing 'page' parameter");
    };

    let _ = state.commands.send(Command::Navigate {
        page: page.to_string(),
    });

    Response::ok(json!({"page": page}))
}

fn handle_ping(state: &ServerState) -> Response {
    Response::ok(json!({"pong": true, "listening": state.is_listening()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_state() -> (ServerState, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = crate::command::command_channel();
        (ServerState::new(tx), rx)
    }

    fn error_of(resp: &Response) -> &str {
        assert!(!resp.success);
        resp.error.as_deref().unwrap()
    }

    #[tokio::test]
    async fn malformed_json_reports_parse_error() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, "{not json").await;
        assert!(error_of(&resp).starts_with("JSON parse error:"));
    }

    #[tokio::test]
    async fn non_object_frame_is_rejected() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, "[1, 2, 3]").await;
        assert_eq!(error_of(&resp), "Request must be a JSON object");
    }

    #[tokio::test]
    async fn unknown_action_is_named_in_error() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "teleport"}"#).await;
        assert_eq!(error_of(&resp), "Unknown action: 'teleport'");
    }

    #[tokio::test]
    async fn missing_action_reports_empty_name() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, r#"{"page": "GaugeTick"}"#).await;
        assert_eq!(error_of(&resp), "Unknown action: ''");
    }

    #[tokio::test]
    async fn ping_reports_liveness_and_listening() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "ping"}"#).await;
        assert!(resp.success);
        assert_eq!(resp.data, Some(json!({"pong": true, "listening": false})));
    }

    #[tokio::test]
    async fn get_state_returns_full_snapshot() {
        let (state, _rx) = test_state();
        state.set_page_title("Gauge Tick").await;
        state.set_page("GaugeTick").await;
        state.update_property("speed", json!(42)).await;
        state
            .set_property_metadata(vec![json!({"name": "speed", "type": "real"})])
            .await;

        let resp = handle_frame(&state, r#"{"action": "getState"}"#).await;
        assert_eq!(
            resp.data,
            Some(json!({
                "page": "GaugeTick",
                "pageTitle": "Gauge Tick",
                "properties": {"speed": 42},
                "propertyMetadata": [{"name": "speed", "type": "real"}],
            }))
        );
    }

    #[tokio::test]
    async fn get_property_unknown_name_errors() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "getProperty", "name": "x"}"#).await;
        assert_eq!(error_of(&resp), "Property 'x' not found");
    }

    #[tokio::test]
    async fn get_property_missing_name_errors() {
        let (state, _rx) = test_state();
        for frame in [
            r#"{"action": "getProperty"}"#,
            r#"{"action": "getProperty", "name": ""}"#,
            r#"{"action": "getProperty", "name": 7}"#,
        ] {
            let resp = handle_frame(&state, frame).await;
            assert_eq!(error_of(&resp), "Missing 'name' parameter");
        }
    }

    #[tokio::test]
    async fn get_property_returns_stored_value() {
        let (state, _rx) = test_state();
        state.update_property("tickShape", json!("triangle")).await;

        let resp = handle_frame(&state, r#"{"action": "getProperty", "name": "tickShape"}"#).await;
        assert_eq!(
            resp.data,
            Some(json!({"name": "tickShape", "value": "triangle"}))
        );
    }

    #[tokio::test]
    async fn set_property_echoes_without_mutating() {
        let (state, mut rx) = test_state();
        let resp = handle_frame(
            &state,
            r#"{"action": "setProperty", "name": "speed", "value": 42}"#,
        )
        .await;

        assert_eq!(resp.data, Some(json!({"name": "speed", "value": 42})));
        // Store untouched: only the embedding application applies changes.
        assert_eq!(state.get_property("speed").await, None);
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::SetProperty {
                name: "speed".into(),
                value: json!(42),
            }
        );
    }

    #[tokio::test]
    async fn set_property_null_value_is_a_value() {
        let (state, mut rx) = test_state();
        let resp = handle_frame(
            &state,
            r#"{"action": "setProperty", "name": "label", "value": null}"#,
        )
        .await;

        assert!(resp.success);
        assert_eq!(resp.data, Some(json!({"name": "label", "value": null})));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn set_property_missing_value_errors() {
        let (state, mut rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "setProperty", "name": "speed"}"#).await;
        assert_eq!(error_of(&resp), "Missing 'value' parameter");
        assert!(rx.try_recv().is_err(), "no command on validation failure");
    }

    #[tokio::test]
    async fn set_property_survives_dropped_command_receiver() {
        let (state, rx) = test_state();
        drop(rx);
        let resp = handle_frame(
            &state,
            r#"{"action": "setProperty", "name": "speed", "value": 1}"#,
        )
        .await;
        assert!(resp.success);
    }

    #[tokio::test]
    async fn navigate_emits_command_and_echoes_page() {
        let (state, mut rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "navigate", "page": "GaugeTick"}"#).await;

        assert_eq!(resp.data, Some(json!({"page": "GaugeTick"})));
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::Navigate {
                page: "GaugeTick".into(),
            }
        );
        // Navigation is applied by the embedding application, not here.
        assert_eq!(state.snapshot().await.page, "");
    }

    #[tokio::test]
    async fn navigate_missing_page_errors() {
        let (state, _rx) = test_state();
        let resp = handle_frame(&state, r#"{"action": "navigate"}"#).await;
        assert_eq!(error_of(&resp), "Missing 'page' parameter");
    }

    #[tokio::test]
    async fn list_properties_preserves_stored_order() {
        let (state, _rx) = test_state();
        let metadata = vec![
            json!({"name": "zeta"}),
            json!({"name": "alpha"}),
            json!({"name": "mid"}),
        ];
        state.set_property_metadata(metadata.clone()).await;

        let resp = handle_frame(&state, r#"{"action": "listProperties"}"#).await;
        assert_eq!(resp.data, Some(Value::Array(metadata)));
    }
}
