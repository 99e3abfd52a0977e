use std::collections::HashMap;
use std::ops::Range;

use crate::ids::EventId;
use crate::merge::{EntryKey, MergedEntry};

use super::extract::Extractors;

/// One matching entry of the merged sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub index: usize,
    pub key: EntryKey,
    /// Byte ranges of each match inside the entry's extracted text. Empty when
    /// case folding changed the text length and offsets would not line up.
    pub ranges: Vec<Range<usize>>,
}

/// Ordered hits for one query plus the navigation pointer.
///
/// Hits are ascending by index. The pointer stays in `[0, len)` whenever there
/// is at least one hit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchIndex {
    hits: Vec<SearchHit>,
    pointer: usize,
}

/// Match results of finalized events for one needle.
///
/// Finalized events never change, so an entry stays valid until the needle
/// does. `None` marks an event that does not match or could not be extracted.
#[derive(Debug, Clone, Default)]
pub struct MatchCache {
    needle: String,
    events: HashMap<EventId, Option<Vec<Range<usize>>>>,
}

impl MatchCache {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.needle.clear();
        self.events.clear();
    }

    fn retarget(&mut self, needle: &str) {
        if self.needle != needle {
            self.needle = needle.to_string();
            self.events.clear();
        }
    }
}

impl SearchIndex {
    /// Case-insensitive substring search over `entries`.
    ///
    /// An empty query matches nothing.
    pub fn build(query: &str, entries: &[MergedEntry<'_>], extractors: &Extractors) -> Self {
        Self::build_cached(query, entries, extractors, &mut MatchCache::default())
    }

    /// Same as [`SearchIndex::build`], reusing finalized-event results from
    /// `cache`. Only new events and in-progress entries are extracted.
    pub fn build_cached(
        query: &str,
        entries: &[MergedEntry<'_>],
        extractors: &Extractors,
        cache: &mut MatchCache,
    ) -> Self {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Self::default();
        }
        cache.retarget(&needle);

        let mut hits = Vec::new();
        let mut extracted = 0usize;
        let mut skipped = 0usize;
        for (index, entry) in entries.iter().enumerate() {
            let cached = match *entry {
                MergedEntry::Finalized(event) => cache.events.get(&event.id).cloned(),
                MergedEntry::InProgress(_) | MergedEntry::Optimistic(_) => None,
            };

            let ranges = match cached {
                Some(ranges) => ranges,
                None => {
                    extracted += 1;
                    let ranges = match extractors.entry_text(entry) {
                        Some(text) => find_match_ranges(&text, &needle),
                        None => {
                            skipped += 1;
                            None
                        }
                    };
                    if let MergedEntry::Finalized(event) = *entry {
                        cache.events.insert(event.id, ranges.clone());
                    }
                    ranges
                }
            };

            if let Some(ranges) = ranges {
                hits.push(SearchHit {
                    index,
                    key: entry.key(),
                    ranges,
                });
            }
        }

        tracing::debug!(
            entries = entries.len(),
            extracted,
            hits = hits.len(),
            skipped,
            "rebuilt search index"
        );
        Self { hits, pointer: 0 }
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn result_indices(&self) -> Vec<usize> {
        self.hits.iter().map(|hit| hit.index).collect()
    }

    pub fn current_result_pointer(&self) -> usize {
        self.pointer
    }

    pub fn current(&self) -> Option<&SearchHit> {
        self.hits.get(self.pointer)
    }

    pub fn hit_at_index(&self, index: usize) -> Option<&SearchHit> {
        self.hits
            .binary_search_by_key(&index, |hit| hit.index)
            .ok()
            .map(|position| &self.hits[position])
    }

    /// Advances the pointer cyclically; no-op without hits.
    pub fn next_result(&mut self) -> Option<&SearchHit> {
        if self.hits.is_empty() {
            return None;
        }

        self.pointer = (self.pointer + 1) % self.hits.len();
        self.current()
    }

    /// Retreats the pointer cyclically; no-op without hits.
    pub fn previous_result(&mut self) -> Option<&SearchHit> {
        if self.hits.is_empty() {
            return None;
        }

        self.pointer = if self.pointer == 0 {
            self.hits.len() - 1
        } else {
            self.pointer - 1
        };
        self.current()
    }
}

/// Returns `None` when `haystack` does not contain `needle_lower` ignoring case.
fn find_match_ranges(haystack: &str, needle_lower: &str) -> Option<Vec<Range<usize>>> {
    let folded = haystack.to_lowercase();
    let positions = folded
        .match_indices(needle_lower)
        .map(|(start, matched)| start..start + matched.len())
        .collect::<Vec<_>>();

    if positions.is_empty() {
        return None;
    }

    if folded.len() == haystack.len() {
        Some(positions)
    } else {
        Some(Vec::new())
    }
}
