use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::ids::ResponseId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChunkError {
    #[snafu(display("failed to decode stream chunk: {source}"))]
    DecodeChunk {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("stream chunk has an empty response id"))]
    EmptyResponseId { stage: &'static str },
}

pub type ChunkResult<T> = Result<T, ChunkError>;

/// One incremental fragment of a streamed response as delivered by the transport.
///
/// `content` and `reasoning_content` are deltas, never cumulative text. A chunk
/// with `is_complete` set is an append followed by completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub response_id: ResponseId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
}

impl StreamChunk {
    pub fn new(response_id: impl Into<ResponseId>, content: impl Into<String>) -> Self {
        Self {
            response_id: response_id.into(),
            content: content.into(),
            reasoning_content: None,
            is_complete: false,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning_content = Some(reasoning.into());
        self
    }

    pub fn completing(mut self) -> Self {
        self.is_complete = true;
        self
    }

    pub fn from_json(raw: &str) -> ChunkResult<Self> {
        let chunk: Self = serde_json::from_str(raw).context(DecodeChunkSnafu {
            stage: "decode-stream-chunk",
        })?;

        if chunk.response_id.as_str().trim().is_empty() {
            return EmptyResponseIdSnafu {
                stage: "validate-stream-chunk",
            }
            .fail();
        }

        Ok(chunk)
    }

    pub fn reasoning_delta(&self) -> Option<&str> {
        self.reasoning_content.as_deref()
    }
}
