//! Gaugelink wire protocol.
//!
//! All communication is JSON-over-WebSocket. Clients send request objects
//! carrying an `action` field; the server answers every request with exactly
//! one [`Response`] frame and pushes unsolicited [`Notification`] frames to
//! every connected client whenever shared state changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default state server port, overridable via `GAUGELINK_STATE_PORT`.
pub const DEFAULT_PORT: u16 = 9876;

/// Reply to a single request frame.
///
/// Success: `{"success": true, "data": ...}`.
/// Failure: `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Build a success response carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Build an error response with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Server-initiated broadcast describing a state change.
///
/// These are the only two notification kinds; they are never sent as the
/// reply to a specific request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Notification {
    PageChanged { page: String, title: String },
    PropertyChanged { name: String, value: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_response_omits_error_field() {
        let resp = Response::ok(json!({"pong": true}));
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire, json!({"success": true, "data": {"pong": true}}));
    }

    #[test]
    fn error_response_omits_data_field() {
        let resp = Response::error("Property 'x' not found");
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            wire,
            json!({"success": false, "error": "Property 'x' not found"})
        );
    }

    #[test]
    fn page_changed_wire_shape() {
        let n = Notification::PageChanged {
            page: "GaugeTick".into(),
            title: "Gauge Tick".into(),
        };
        let wire = serde_json::to_value(&n).unwrap();
        assert_eq!(
            wire,
            json!({"event": "pageChanged", "page": "GaugeTick", "title": "Gauge Tick"})
        );
    }

    #[test]
    fn property_changed_wire_shape() {
        let n = Notification::PropertyChanged {
            name: "speed".into(),
            value: json!(42),
        };
        let wire = serde_json::to_value(&n).unwrap();
        assert_eq!(
            wire,
            json!({"event": "propertyChanged", "name": "speed", "value": 42})
        );
    }

    #[test]
    fn notification_round_trips() {
        let raw = r#"{"event":"propertyChanged","name":"tickShape","value":"triangle"}"#;
        let n: Notification = serde_json::from_str(raw).unwrap();
        match n {
            Notification::PropertyChanged { name, value } => {
                assert_eq!(name, "tickShape");
                assert_eq!(value, json!("triangle"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
}
