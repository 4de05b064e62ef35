//! The shared state snapshot exposed over the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full in-memory state of the observed application at a point in time.
///
/// There is exactly one live snapshot per running server; it is created
/// empty at start and discarded at stop. `properties` and
/// `property_metadata` are independent layers — the server stores both
/// verbatim and never cross-validates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Currently displayed page; empty string means no page set.
    pub page: String,

    /// Human-readable title of the current page.
    pub page_title: String,

    /// Property name -> current value. Values are arbitrary JSON.
    pub properties: Map<String, Value>,

    /// Opaque per-property descriptor records, in listing order.
    pub property_metadata: Vec<Value>,
}
