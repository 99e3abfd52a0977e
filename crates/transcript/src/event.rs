use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EventId, ResponseId};

/// Discriminator for finalized events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Action,
    Observation,
    StreamingText,
    System,
}

/// Payload schema generation carried on every event.
///
/// The two generations are structurally incompatible; search picks its
/// extractor from this tag instead of inspecting payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    /// Flat string fields (`message`, `content`, `thought`, ...).
    Legacy,
    /// Nested content blocks plus separate reasoning fields.
    #[default]
    Current,
}

/// Immutable entry of the event log.
///
/// Events are owned by the data-fetching layer; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    #[serde(default)]
    pub version: SchemaVersion,
    /// Set when this event finalizes a streamed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<ResponseId>,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(id: EventId, kind: EventKind, version: SchemaVersion, payload: Value) -> Self {
        Self {
            id,
            kind,
            version,
            response_id: None,
            payload,
        }
    }

    /// Links the event to the stream it finalizes.
    pub fn with_response_id(mut self, response_id: impl Into<ResponseId>) -> Self {
        self.response_id = Some(response_id.into());
        self
    }

    /// Returns true when this event replaces the given stream in the merged view.
    pub fn finalizes(&self, response_id: &ResponseId) -> bool {
        self.response_id.as_ref() == Some(response_id)
    }
}
