use std::collections::HashSet;

use crate::event::Event;
use crate::ids::{EventId, LocalMessageId, ResponseId};
use crate::stream::{StreamAggregator, StreamingMessage};

/// Optimistic user message shown before the server acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    pub id: LocalMessageId,
    pub text: String,
}

impl LocalMessage {
    pub fn new(id: LocalMessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Stable render key of one merged entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Event(EventId),
    Stream(ResponseId),
    Local(LocalMessageId),
}

/// One row of the rendering-ready sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergedEntry<'a> {
    Finalized(&'a Event),
    InProgress(&'a StreamingMessage),
    Optimistic(&'a LocalMessage),
}

impl MergedEntry<'_> {
    pub fn key(&self) -> EntryKey {
        match self {
            Self::Finalized(event) => EntryKey::Event(event.id),
            Self::InProgress(message) => EntryKey::Stream(message.response_id().clone()),
            Self::Optimistic(message) => EntryKey::Local(message.id),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }
}

/// Builds the merged sequence.
///
/// Finalized events keep log order. Streams not yet finalized by an event
/// follow in arrival order, and the optimistic message, if any, is last. A
/// stream whose response id is carried by a finalized event is never emitted,
/// so the same response cannot render twice. The output depends only on the
/// inputs.
pub fn merge<'a>(
    events: &'a [Event],
    streams: &'a StreamAggregator,
    optimistic: Option<&'a LocalMessage>,
) -> Vec<MergedEntry<'a>> {
    let finalized: HashSet<&ResponseId> = events
        .iter()
        .filter_map(|event| event.response_id.as_ref())
        .collect();

    let mut pending = streams
        .streams()
        .filter(|message| !finalized.contains(message.response_id()))
        .collect::<Vec<_>>();
    pending.sort_by_key(|message| message.arrival());

    let mut merged = Vec::with_capacity(events.len() + pending.len() + 1);
    merged.extend(events.iter().map(MergedEntry::Finalized));
    merged.extend(pending.into_iter().map(MergedEntry::InProgress));
    merged.extend(optimistic.map(MergedEntry::Optimistic));
    merged
}
