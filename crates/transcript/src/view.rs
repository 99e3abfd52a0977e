use std::sync::Arc;

use crate::event::Event;
use crate::ids::{ConversationId, ResponseId};
use crate::merge::{LocalMessage, MergedEntry, merge};
use crate::notify::SubscriptionId;
use crate::search::{ContentSearch, SearchChange, SearchHit, SearchSnapshot};
use crate::settings::ViewSettings;
use crate::stream::{
    AppendOutcome, ChunkOutcome, CompleteOutcome, StreamAggregator, StreamChange, StreamChunk,
    StreamingMessage,
};
use crate::viewport::{ScrollRequest, ViewportWindow, WindowState};

/// Everything one open conversation needs between the event log and the
/// renderer.
///
/// The finalized event log stays with the caller; each call that depends on it
/// takes the current slice. Call [`ConversationView::sync`] after the log or the
/// streams change so the window and the search results follow the merged
/// sequence.
#[derive(Debug)]
pub struct ConversationView {
    conversation_id: ConversationId,
    settings: Arc<ViewSettings>,
    streams: StreamAggregator,
    window: ViewportWindow,
    search: ContentSearch,
    optimistic: Option<LocalMessage>,
}

impl ConversationView {
    pub fn open(conversation_id: ConversationId, settings: Arc<ViewSettings>) -> Self {
        tracing::info!(%conversation_id, "opened conversation view");
        Self {
            conversation_id,
            window: ViewportWindow::new(settings.window_config()),
            search: ContentSearch::new(settings.search_min_query_len),
            settings,
            streams: StreamAggregator::new(),
            optimistic: None,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    pub fn streams(&self) -> &StreamAggregator {
        &self.streams
    }

    pub fn window(&self) -> &ViewportWindow {
        &self.window
    }

    pub fn search(&self) -> &ContentSearch {
        &self.search
    }

    pub fn optimistic(&self) -> Option<&LocalMessage> {
        self.optimistic.as_ref()
    }

    pub fn subscribe_streams(
        &mut self,
        listener: impl FnMut(&StreamChange) + 'static,
    ) -> SubscriptionId {
        self.streams.subscribe(listener)
    }

    pub fn subscribe_search(
        &mut self,
        listener: impl FnMut(&SearchChange) + 'static,
    ) -> SubscriptionId {
        self.search.subscribe(listener)
    }

    pub fn append_chunk(
        &mut self,
        response_id: &ResponseId,
        text_delta: &str,
        reasoning_delta: Option<&str>,
    ) -> AppendOutcome {
        self.streams.append_chunk(response_id, text_delta, reasoning_delta)
    }

    pub fn apply_chunk(&mut self, chunk: &StreamChunk) -> ChunkOutcome {
        self.streams.apply_chunk(chunk)
    }

    pub fn complete_stream(&mut self, response_id: &ResponseId) -> CompleteOutcome<'_> {
        self.streams.complete_stream(response_id)
    }

    pub fn clear_stream(&mut self, response_id: &ResponseId) -> Option<StreamingMessage> {
        self.streams.clear_stream(response_id)
    }

    /// Drops completed streams whose response id is now carried by an event.
    ///
    /// Returns how many streams were released.
    pub fn release_finalized(&mut self, events: &[Event]) -> usize {
        let finalized = self
            .streams
            .streams()
            .filter(|message| message.is_complete())
            .filter(|message| {
                events.iter().any(|event| event.finalizes(message.response_id()))
            })
            .map(|message| message.response_id().clone())
            .collect::<Vec<_>>();

        for response_id in &finalized {
            let _ = self.streams.clear_stream(response_id);
        }
        finalized.len()
    }

    /// Shows a locally submitted message until the log acknowledges it.
    pub fn set_optimistic(&mut self, message: LocalMessage) {
        self.optimistic = Some(message);
    }

    pub fn clear_optimistic(&mut self) -> Option<LocalMessage> {
        self.optimistic.take()
    }

    pub fn merged<'a>(&'a self, events: &'a [Event]) -> Vec<MergedEntry<'a>> {
        merge(events, &self.streams, self.optimistic.as_ref())
    }

    /// Pushes the current merged length into the window and refreshes search.
    pub fn sync(&mut self, events: &[Event]) -> WindowState {
        let merged = merge(events, &self.streams, self.optimistic.as_ref());
        self.window.on_length_change(merged.len());
        self.search.refresh(&merged);
        self.window.state()
    }

    pub fn window_state(&self) -> WindowState {
        self.window.state()
    }

    pub fn set_viewport_height(&mut self, height: f32) -> WindowState {
        self.window.set_viewport_height(height);
        self.window.state()
    }

    pub fn on_scroll(&mut self, position: f32) -> WindowState {
        self.window.on_scroll(position);
        self.window.state()
    }

    pub fn scroll_to_end(&mut self) -> WindowState {
        self.window.scroll_to_end();
        self.window.state()
    }

    pub fn record_item_height(&mut self, index: usize, height: f32) -> bool {
        self.window.record_item_height(index, height)
    }

    pub fn take_scroll_request(&mut self) -> Option<ScrollRequest> {
        self.window.take_scroll_request()
    }

    pub fn set_query(&mut self, query: &str, events: &[Event]) -> SearchSnapshot {
        let merged = merge(events, &self.streams, self.optimistic.as_ref());
        self.search.set_query(query, &merged);
        self.search.snapshot()
    }

    pub fn search_snapshot(&self) -> SearchSnapshot {
        self.search.snapshot()
    }

    pub fn current_result(&self) -> Option<&SearchHit> {
        self.search.index().current()
    }

    /// Moves to the next hit and scrolls the window to it.
    pub fn next_result(&mut self) -> Option<usize> {
        let index = self.search.next_result()?.index;
        self.window.scroll_to_index(index)
    }

    /// Moves to the previous hit and scrolls the window to it.
    pub fn previous_result(&mut self) -> Option<usize> {
        let index = self.search.previous_result()?.index;
        self.window.scroll_to_index(index)
    }

    /// Scrolls the window to the hit under the pointer without moving it.
    pub fn focus_current_result(&mut self) -> Option<usize> {
        let index = self.search.index().current()?.index;
        self.window.scroll_to_index(index)
    }

    /// Reuses this view for another conversation.
    pub fn switch_conversation(&mut self, conversation_id: ConversationId) {
        let previous = self.conversation_id;
        self.reset_state();
        self.conversation_id = conversation_id;
        tracing::info!(from = %previous, to = %conversation_id, "switched conversation view");
    }

    pub fn close(mut self) {
        self.reset_state();
        tracing::info!(conversation_id = %self.conversation_id, "closed conversation view");
    }

    fn reset_state(&mut self) {
        self.streams.clear_all();
        self.window.reset();
        self.search.clear();
        self.optimistic = None;
    }
}
