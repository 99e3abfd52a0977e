/// Chunk aggregation per response id.
pub mod aggregator;
/// Wire contract for streamed chunks.
pub mod chunk;
/// In-progress message accumulated from chunks.
pub mod message;

pub use aggregator::{AppendOutcome, ChunkOutcome, CompleteOutcome, StreamAggregator, StreamChange};
pub use chunk::{ChunkError, ChunkResult, StreamChunk};
pub use message::StreamingMessage;
