use crate::merge::MergedEntry;
use crate::notify::{Notifier, SubscriptionId};

use super::extract::Extractors;
use super::index::{MatchCache, SearchHit, SearchIndex};

/// Renderer-facing view of the current search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSnapshot {
    pub result_indices: Vec<usize>,
    pub current_result_pointer: usize,
}

/// Change notification emitted after the search state is updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchChange {
    /// Results were recomputed and the pointer reset to 0.
    Results { count: usize },
    PointerMoved { pointer: usize, index: usize },
    Cleared,
}

/// Query plus the index derived from it for one conversation view.
///
/// Any change to the query or to the merged sequence rebuilds the index and
/// resets the pointer. Leading and trailing whitespace is not part of the
/// searched text. Finalized events are matched once per query and then served
/// from a cache, so refreshing while output streams only re-reads new entries.
#[derive(Debug)]
pub struct ContentSearch {
    query: String,
    min_query_len: usize,
    index: SearchIndex,
    matches: MatchCache,
    extractors: Extractors,
    changes: Notifier<SearchChange>,
}

impl ContentSearch {
    pub fn new(min_query_len: usize) -> Self {
        Self::with_extractors(min_query_len, Extractors::default())
    }

    pub fn with_extractors(min_query_len: usize, extractors: Extractors) -> Self {
        Self {
            query: String::new(),
            min_query_len: min_query_len.max(1),
            index: SearchIndex::default(),
            matches: MatchCache::default(),
            extractors,
            changes: Notifier::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SearchChange) + 'static) -> SubscriptionId {
        self.changes.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn extractors(&self) -> &Extractors {
        &self.extractors
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            result_indices: self.index.result_indices(),
            current_result_pointer: self.index.current_result_pointer(),
        }
    }

    /// Replaces the query; setting the same query again keeps the pointer.
    pub fn set_query(&mut self, query: &str, entries: &[MergedEntry<'_>]) {
        if self.query == query {
            return;
        }

        self.query = query.to_string();
        self.rebuild(entries);
    }

    /// Rebuilds after the merged sequence changed.
    pub fn refresh(&mut self, entries: &[MergedEntry<'_>]) {
        if self.query.is_empty() {
            return;
        }

        self.rebuild(entries);
    }

    pub fn next_result(&mut self) -> Option<&SearchHit> {
        self.index.next_result()?;
        self.emit_pointer_moved();
        self.index.current()
    }

    pub fn previous_result(&mut self) -> Option<&SearchHit> {
        self.index.previous_result()?;
        self.emit_pointer_moved();
        self.index.current()
    }

    pub fn clear(&mut self) {
        let had_state = !self.query.is_empty() || !self.index.is_empty();
        self.query.clear();
        self.index = SearchIndex::default();
        self.matches.clear();
        if had_state {
            self.changes.emit(&SearchChange::Cleared);
        }
    }

    fn rebuild(&mut self, entries: &[MergedEntry<'_>]) {
        let needle = self.query.trim();
        self.index = if needle.chars().count() < self.min_query_len {
            SearchIndex::default()
        } else {
            SearchIndex::build_cached(needle, entries, &self.extractors, &mut self.matches)
        };

        self.changes.emit(&SearchChange::Results {
            count: self.index.len(),
        });
    }

    fn emit_pointer_moved(&mut self) {
        if let Some(hit) = self.index.current() {
            let change = SearchChange::PointerMoved {
                pointer: self.index.current_result_pointer(),
                index: hit.index,
            };
            self.changes.emit(&change);
        }
    }
}

impl Default for ContentSearch {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use serde_json::{Value, json};

    use super::*;
    use crate::event::{Event, EventKind, SchemaVersion};
    use crate::ids::{EventId, ResponseId};
    use crate::search::extract::{
        ContentExtractor, ExtractResult, LegacyExtractor, StructuredExtractor,
    };
    use crate::stream::StreamAggregator;

    struct CountingExtractor {
        calls: Rc<Cell<usize>>,
    }

    impl ContentExtractor for CountingExtractor {
        fn extract<'a>(&self, payload: &'a Value) -> ExtractResult<Vec<&'a str>> {
            self.calls.set(self.calls.get() + 1);
            LegacyExtractor.extract(payload)
        }
    }

    fn events(messages: &[&str]) -> Vec<Event> {
        messages
            .iter()
            .enumerate()
            .map(|(id, message)| {
                Event::new(
                    EventId::new(id as u64),
                    EventKind::Message,
                    SchemaVersion::Legacy,
                    json!({ "message": message }),
                )
            })
            .collect()
    }

    #[test]
    fn query_change_resets_pointer_and_notifies() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let log = events(&["alpha", "beta", "alphabet"]);
        let entries = log.iter().map(MergedEntry::Finalized).collect::<Vec<_>>();
        let mut search = ContentSearch::default();
        {
            let changes = Rc::clone(&changes);
            search.subscribe(move |change| changes.borrow_mut().push(change.clone()));
        }

        search.set_query("alpha", &entries);
        let _ = search.next_result();
        assert_eq!(search.snapshot().current_result_pointer, 1);

        search.set_query("alpha", &entries);
        assert_eq!(search.snapshot().current_result_pointer, 1);

        search.set_query("bet", &entries);
        assert_eq!(
            search.snapshot(),
            SearchSnapshot {
                result_indices: vec![1, 2],
                current_result_pointer: 0,
            }
        );

        assert_eq!(
            *changes.borrow(),
            vec![
                SearchChange::Results { count: 2 },
                SearchChange::PointerMoved {
                    pointer: 1,
                    index: 2,
                },
                SearchChange::Results { count: 2 },
            ]
        );
    }

    #[test]
    fn sequence_change_rebuilds_index() {
        let mut log = events(&["first error"]);
        let mut search = ContentSearch::default();
        {
            let entries = log.iter().map(MergedEntry::Finalized).collect::<Vec<_>>();
            search.set_query("error", &entries);
        }

        log.extend(events(&["x", "second error"]).into_iter().skip(1));
        let entries = log.iter().map(MergedEntry::Finalized).collect::<Vec<_>>();
        search.refresh(&entries);

        assert_eq!(search.snapshot().result_indices, vec![0, 1]);
    }

    #[test]
    fn short_queries_and_clear_produce_no_results() {
        let log = events(&["abc"]);
        let entries = log.iter().map(MergedEntry::Finalized).collect::<Vec<_>>();
        let mut search = ContentSearch::new(2);

        search.set_query("a", &entries);
        assert!(search.index().is_empty());

        search.set_query("ab", &entries);
        assert_eq!(search.index().len(), 1);

        search.clear();
        assert_eq!(search.query(), "");
        assert_eq!(search.snapshot(), SearchSnapshot::default());
        assert!(search.next_result().is_none());
    }

    #[test]
    fn surrounding_whitespace_is_not_searched() {
        let log = events(&["it failed", "xfail"]);
        let entries = log.iter().map(MergedEntry::Finalized).collect::<Vec<_>>();
        let mut search = ContentSearch::new(3);

        search.set_query("  fail ", &entries);
        assert_eq!(search.snapshot().result_indices, vec![0, 1]);

        search.set_query("  fa ", &entries);
        assert!(search.index().is_empty());
    }

    #[test]
    fn streaming_refresh_reuses_finalized_matches() {
        let calls = Rc::new(Cell::new(0));
        let extractors = Extractors::new(
            CountingExtractor {
                calls: Rc::clone(&calls),
            },
            StructuredExtractor,
        );
        let mut search = ContentSearch::with_extractors(1, extractors);
        let log = events(&["error one", "fine", "error two"]);
        let response_id = ResponseId::new("r1");
        let mut streams = StreamAggregator::new();

        let _ = streams.append_chunk(&response_id, "no problem", None);
        {
            let entries = crate::merge::merge(&log, &streams, None);
            search.set_query("error", &entries);
        }
        assert_eq!(calls.get(), 3);

        let _ = streams.append_chunk(&response_id, ", just an error", None);
        let entries = crate::merge::merge(&log, &streams, None);
        search.refresh(&entries);

        assert_eq!(calls.get(), 3);
        assert_eq!(search.snapshot().result_indices, vec![0, 2, 3]);

        search.set_query("fine", &entries);
        assert_eq!(calls.get(), 6);
        assert_eq!(search.snapshot().result_indices, vec![1]);
    }
}
