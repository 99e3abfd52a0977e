#![deny(unsafe_code)]

//! Streaming aggregation and windowed rendering core for chat transcripts.
//!
//! The crate owns no rendering technology. A surface feeds it finalized events,
//! streamed chunks, viewport measurements, and search input, and reads back the
//! merged sequence, the index range to materialize, and search hits.

/// Finalized event model and schema-version tags.
pub mod event;
pub mod ids;
pub mod logging;
/// Merge of the finalized event log with in-flight streams.
pub mod merge;
pub mod notify;
/// Content extraction and query indexing over the merged sequence.
pub mod search;
/// Persisted view settings.
pub mod settings;
/// Chunk aggregation per response id.
pub mod stream;
/// Per-conversation facade tying every component together.
pub mod view;
/// Index-range windowing and follow-bottom policy.
pub mod viewport;

pub use event::{Event, EventKind, SchemaVersion};
pub use ids::{ConversationId, EventId, LocalMessageId, ResponseId};
pub use merge::{EntryKey, LocalMessage, MergedEntry, merge};
pub use notify::{Notifier, SubscriptionId};
pub use search::{
    ContentExtractor, ContentSearch, ExtractError, Extractors, LegacyExtractor, MatchCache,
    SearchChange, SearchHit, SearchIndex, SearchSnapshot, StructuredExtractor,
};
pub use settings::{SettingsError, SettingsResult, SettingsStore, ViewSettings};
pub use stream::{
    AppendOutcome, ChunkError, ChunkOutcome, ChunkResult, CompleteOutcome, StreamAggregator,
    StreamChange, StreamChunk, StreamingMessage,
};
pub use view::ConversationView;
pub use viewport::{
    FollowTracker, ItemHeights, RenderMode, ScrollBehavior, ScrollRequest, ViewportWindow,
    WindowConfig, WindowState,
};
