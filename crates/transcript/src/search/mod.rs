/// Query state and change notifications for the renderer.
pub mod controller;
/// Per-schema-version content extractors.
pub mod extract;
/// Ordered hits and cyclic navigation.
pub mod index;

pub use controller::{ContentSearch, SearchChange, SearchSnapshot};
pub use extract::{
    ContentExtractor, ExtractError, ExtractResult, Extractors, LegacyExtractor, StructuredExtractor,
};
pub use index::{MatchCache, SearchHit, SearchIndex};
