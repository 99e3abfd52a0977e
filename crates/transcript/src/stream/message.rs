use std::time::SystemTime;

use crate::ids::ResponseId;

/// Transient message assembled from streamed deltas.
///
/// `content` and `reasoning_content` only grow, and `is_complete` flips from
/// false to true at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingMessage {
    response_id: ResponseId,
    content: String,
    reasoning_content: String,
    is_complete: bool,
    started_at: SystemTime,
    arrival: u64,
}

impl StreamingMessage {
    pub(crate) fn start(response_id: ResponseId, arrival: u64) -> Self {
        Self {
            response_id,
            content: String::new(),
            reasoning_content: String::new(),
            is_complete: false,
            started_at: SystemTime::now(),
            arrival,
        }
    }

    pub fn response_id(&self) -> &ResponseId {
        &self.response_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning_content(&self) -> &str {
        &self.reasoning_content
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Registry insertion order, used to order synthetic entries deterministically.
    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    pub(crate) fn push_delta(&mut self, text_delta: &str, reasoning_delta: &str) {
        self.content.push_str(text_delta);
        self.reasoning_content.push_str(reasoning_delta);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.is_complete = true;
    }
}
