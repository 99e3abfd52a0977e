use std::collections::HashMap;

use crate::ids::ResponseId;
use crate::notify::{Notifier, SubscriptionId};

use super::chunk::StreamChunk;
use super::message::StreamingMessage;

/// Change notification emitted after the registry is updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChange {
    Started(ResponseId),
    Appended(ResponseId),
    Completed(ResponseId),
    LateChunkRejected(ResponseId),
    Cleared(ResponseId),
    ClearedAll,
}

/// Result of [`StreamAggregator::append_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AppendOutcome {
    /// First chunk for the id; a new entry was created.
    Created,
    Appended,
    /// The stream had already completed; nothing was appended.
    RejectedLate,
}

/// Result of [`StreamAggregator::complete_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum CompleteOutcome<'a> {
    Completed(&'a StreamingMessage),
    /// Repeated completion; state is unchanged.
    AlreadyComplete(&'a StreamingMessage),
    /// No stream is registered under the id.
    Unknown,
}

impl<'a> CompleteOutcome<'a> {
    pub fn message(self) -> Option<&'a StreamingMessage> {
        match self {
            Self::Completed(message) | Self::AlreadyComplete(message) => Some(message),
            Self::Unknown => None,
        }
    }
}

/// Result of applying one wire chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub append: AppendOutcome,
    pub completed: bool,
}

/// Registry of in-progress streams for one conversation view.
///
/// Chunks for a response id are applied in arrival order; no reordering or gap
/// detection happens here.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    streams: HashMap<ResponseId, StreamingMessage>,
    next_arrival: u64,
    changes: Notifier<StreamChange>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StreamChange) + 'static) -> SubscriptionId {
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    pub fn append_chunk(
        &mut self,
        response_id: &ResponseId,
        text_delta: &str,
        reasoning_delta: Option<&str>,
    ) -> AppendOutcome {
        let reasoning_delta = reasoning_delta.unwrap_or_default();

        let outcome = match self.streams.get_mut(response_id) {
            Some(message) if message.is_complete() => {
                if text_delta.is_empty() && reasoning_delta.is_empty() {
                    tracing::debug!(%response_id, "ignoring empty chunk for completed stream");
                } else {
                    tracing::warn!(
                        %response_id,
                        text_len = text_delta.len(),
                        reasoning_len = reasoning_delta.len(),
                        "rejecting chunk for completed stream"
                    );
                }
                AppendOutcome::RejectedLate
            }
            Some(message) => {
                message.push_delta(text_delta, reasoning_delta);
                AppendOutcome::Appended
            }
            None => {
                let mut message = StreamingMessage::start(response_id.clone(), self.next_arrival);
                self.next_arrival += 1;
                message.push_delta(text_delta, reasoning_delta);
                self.streams.insert(response_id.clone(), message);
                AppendOutcome::Created
            }
        };

        tracing::trace!(%response_id, ?outcome, "applied stream delta");
        let change = match outcome {
            AppendOutcome::Created => StreamChange::Started(response_id.clone()),
            AppendOutcome::Appended => StreamChange::Appended(response_id.clone()),
            AppendOutcome::RejectedLate => StreamChange::LateChunkRejected(response_id.clone()),
        };
        self.changes.emit(&change);
        outcome
    }

    /// Applies a wire chunk: append, then complete when the chunk is terminal.
    pub fn apply_chunk(&mut self, chunk: &StreamChunk) -> ChunkOutcome {
        let append = self.append_chunk(
            &chunk.response_id,
            &chunk.content,
            chunk.reasoning_delta(),
        );
        let completed = chunk.is_complete
            && !matches!(
                self.complete_stream(&chunk.response_id),
                CompleteOutcome::Unknown
            );

        ChunkOutcome { append, completed }
    }

    pub fn complete_stream(&mut self, response_id: &ResponseId) -> CompleteOutcome<'_> {
        let newly_completed = match self.streams.get_mut(response_id) {
            None => {
                tracing::debug!(%response_id, "completion requested for unknown stream");
                return CompleteOutcome::Unknown;
            }
            Some(message) if message.is_complete() => false,
            Some(message) => {
                message.mark_complete();
                true
            }
        };

        if newly_completed {
            self.changes.emit(&StreamChange::Completed(response_id.clone()));
        }

        match self.streams.get(response_id) {
            Some(message) if newly_completed => CompleteOutcome::Completed(message),
            Some(message) => CompleteOutcome::AlreadyComplete(message),
            None => CompleteOutcome::Unknown,
        }
    }

    pub fn get(&self, response_id: &ResponseId) -> Option<&StreamingMessage> {
        self.streams.get(response_id)
    }

    pub fn content(&self, response_id: &ResponseId) -> &str {
        self.streams
            .get(response_id)
            .map(StreamingMessage::content)
            .unwrap_or_default()
    }

    pub fn reasoning_content(&self, response_id: &ResponseId) -> &str {
        self.streams
            .get(response_id)
            .map(StreamingMessage::reasoning_content)
            .unwrap_or_default()
    }

    pub fn is_streaming(&self, response_id: &ResponseId) -> bool {
        self.streams
            .get(response_id)
            .is_some_and(|message| !message.is_complete())
    }

    /// Ids of streams that have not completed yet, in no particular order.
    pub fn active_stream_ids(&self) -> Vec<ResponseId> {
        self.streams
            .values()
            .filter(|message| !message.is_complete())
            .map(|message| message.response_id().clone())
            .collect()
    }

    /// Every registered stream, completed or not, in no particular order.
    pub fn streams(&self) -> impl Iterator<Item = &StreamingMessage> {
        self.streams.values()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Returns the removed entry, if any.
    pub fn clear_stream(&mut self, response_id: &ResponseId) -> Option<StreamingMessage> {
        let removed = self.streams.remove(response_id);
        if removed.is_some() {
            self.changes.emit(&StreamChange::Cleared(response_id.clone()));
        }
        removed
    }

    /// Conversation teardown hook.
    pub fn clear_all(&mut self) {
        let cleared = self.streams.len();
        self.streams.clear();
        self.next_arrival = 0;
        tracing::debug!(cleared, "cleared stream registry");
        self.changes.emit(&StreamChange::ClearedAll);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;

    fn id(raw: &str) -> ResponseId {
        ResponseId::new(raw)
    }

    #[test]
    fn hello_scenario_accumulates_and_completes() {
        let mut aggregator = StreamAggregator::new();
        let r1 = id("r1");

        assert_eq!(aggregator.append_chunk(&r1, "Hel", None), AppendOutcome::Created);
        assert_eq!(aggregator.append_chunk(&r1, "lo", None), AppendOutcome::Appended);
        assert_eq!(aggregator.content(&r1), "Hello");
        assert!(aggregator.is_streaming(&r1));

        let completed = aggregator.complete_stream(&r1);
        assert!(matches!(completed, CompleteOutcome::Completed(message) if message.content() == "Hello"));
        assert!(!aggregator.is_streaming(&r1));
        assert_eq!(aggregator.content(&r1), "Hello");
    }

    #[test]
    fn completion_is_idempotent() {
        let mut aggregator = StreamAggregator::new();
        let r1 = id("r1");
        let _ = aggregator.append_chunk(&r1, "done", Some("why"));

        let first = aggregator.complete_stream(&r1).message().cloned();
        let second = aggregator.complete_stream(&r1);

        assert!(matches!(second, CompleteOutcome::AlreadyComplete(_)));
        assert_eq!(second.message().cloned(), first);
        assert_eq!(aggregator.content(&r1), "done");
        assert_eq!(aggregator.reasoning_content(&r1), "why");
    }

    #[test]
    fn completing_unknown_stream_is_explicit_noop() {
        let mut aggregator = StreamAggregator::new();
        assert_eq!(aggregator.complete_stream(&id("ghost")), CompleteOutcome::Unknown);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn unknown_ids_read_as_empty() {
        let aggregator = StreamAggregator::new();
        let ghost = id("ghost");

        assert_eq!(aggregator.content(&ghost), "");
        assert_eq!(aggregator.reasoning_content(&ghost), "");
        assert!(!aggregator.is_streaming(&ghost));
        assert!(aggregator.active_stream_ids().is_empty());
    }

    #[test]
    fn late_chunks_are_rejected_and_reported() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let mut aggregator = StreamAggregator::new();
        {
            let changes = Rc::clone(&changes);
            aggregator.subscribe(move |change| changes.borrow_mut().push(change.clone()));
        }
        let r1 = id("r1");

        let _ = aggregator.append_chunk(&r1, "final", None);
        let _ = aggregator.complete_stream(&r1);
        let outcome = aggregator.append_chunk(&r1, " trailing", Some("late"));

        assert_eq!(outcome, AppendOutcome::RejectedLate);
        assert_eq!(aggregator.content(&r1), "final");
        assert_eq!(aggregator.reasoning_content(&r1), "");
        assert_eq!(
            changes.borrow().last(),
            Some(&StreamChange::LateChunkRejected(r1.clone()))
        );
    }

    #[test]
    fn terminal_chunk_appends_then_completes() {
        let mut aggregator = StreamAggregator::new();
        let _ = aggregator.apply_chunk(&StreamChunk::new("r1", "Hi").with_reasoning("think"));
        let outcome = aggregator.apply_chunk(&StreamChunk::new("r1", " there").completing());

        assert_eq!(
            outcome,
            ChunkOutcome {
                append: AppendOutcome::Appended,
                completed: true,
            }
        );
        assert_eq!(aggregator.content(&id("r1")), "Hi there");
        assert_eq!(aggregator.reasoning_content(&id("r1")), "think");
        assert!(!aggregator.is_streaming(&id("r1")));
    }

    #[test]
    fn active_ids_exclude_completed_streams() {
        let mut aggregator = StreamAggregator::new();
        let _ = aggregator.append_chunk(&id("a"), "1", None);
        let _ = aggregator.append_chunk(&id("b"), "2", None);
        let _ = aggregator.complete_stream(&id("a"));

        assert_eq!(aggregator.active_stream_ids(), vec![id("b")]);
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn clear_stream_and_clear_all_remove_entries() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let mut aggregator = StreamAggregator::new();
        {
            let changes = Rc::clone(&changes);
            aggregator.subscribe(move |change| changes.borrow_mut().push(change.clone()));
        }
        let _ = aggregator.append_chunk(&id("a"), "1", None);
        let _ = aggregator.append_chunk(&id("b"), "2", None);

        assert!(aggregator.clear_stream(&id("a")).is_some());
        assert!(aggregator.clear_stream(&id("a")).is_none());
        aggregator.clear_all();

        assert!(aggregator.is_empty());
        assert_eq!(
            *changes.borrow(),
            vec![
                StreamChange::Started(id("a")),
                StreamChange::Started(id("b")),
                StreamChange::Cleared(id("a")),
                StreamChange::ClearedAll,
            ]
        );
    }

    proptest! {
        #[test]
        fn appends_preserve_order_and_isolation(
            deltas in proptest::collection::vec((any::<bool>(), "[a-z ]{0,6}"), 0..40),
        ) {
            let mut aggregator = StreamAggregator::new();
            let (a, b) = (id("a"), id("b"));
            let mut expected_a = String::new();
            let mut expected_b = String::new();

            for (to_a, delta) in &deltas {
                if *to_a {
                    let _ = aggregator.append_chunk(&a, delta, None);
                    expected_a.push_str(delta);
                } else {
                    let _ = aggregator.append_chunk(&b, delta, Some(delta.as_str()));
                    expected_b.push_str(delta);
                }
            }

            prop_assert_eq!(aggregator.content(&a), expected_a.as_str());
            prop_assert_eq!(aggregator.content(&b), expected_b.as_str());
            prop_assert_eq!(aggregator.reasoning_content(&a), "");
            prop_assert_eq!(aggregator.reasoning_content(&b), expected_b.as_str());
        }

        #[test]
        fn repeated_completion_matches_single_completion(repeats in 1usize..8) {
            let mut aggregator = StreamAggregator::new();
            let r = id("r");
            let _ = aggregator.append_chunk(&r, "abc", None);

            for _ in 0..repeats {
                let _ = aggregator.complete_stream(&r);
            }

            prop_assert_eq!(aggregator.content(&r), "abc");
            prop_assert!(!aggregator.is_streaming(&r));
        }
    }
}
