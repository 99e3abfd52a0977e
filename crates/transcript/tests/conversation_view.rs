use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::json;
use transcript::{
    AppendOutcome, ConversationId, ConversationView, EntryKey, Event, EventId, EventKind,
    LocalMessage, LocalMessageId, MergedEntry, RenderMode, ResponseId, ScrollBehavior,
    ScrollRequest, SchemaVersion, StreamChange, StreamChunk, ViewSettings,
};

fn settings() -> Arc<ViewSettings> {
    Arc::new(ViewSettings {
        full_render_threshold: 20,
        overscan: 2,
        estimated_item_height_px: 40.0,
        ..ViewSettings::default()
    })
}

fn user_event(id: u64, text: &str) -> Event {
    Event::new(
        EventId::new(id),
        EventKind::Message,
        SchemaVersion::Current,
        json!({ "content": [{ "type": "input_text", "text": text }] }),
    )
}

fn legacy_observation(id: u64, text: &str) -> Event {
    Event::new(
        EventId::new(id),
        EventKind::Observation,
        SchemaVersion::Legacy,
        json!({ "content": text, "extras": { "exit_code": 0 } }),
    )
}

#[test]
fn full_streaming_session() {
    let mut view = ConversationView::open(ConversationId::new(1), settings());
    let changes = Rc::new(RefCell::new(Vec::new()));
    {
        let changes = Rc::clone(&changes);
        view.subscribe_streams(move |change| changes.borrow_mut().push(change.clone()));
    }

    let mut events = (0..18)
        .map(|id| legacy_observation(id, "build ok"))
        .collect::<Vec<_>>();
    let _ = view.set_viewport_height(200.0);
    assert_eq!(view.sync(&events).range, 0..18);
    assert_eq!(view.window().mode(), RenderMode::Full);
    let _ = view.take_scroll_request();

    // Optimistic user message, then the log acknowledges it.
    view.set_optimistic(LocalMessage::new(LocalMessageId::new(1), "why did it fail?"));
    assert_eq!(view.sync(&events).range, 0..19);
    events.push(user_event(18, "why did it fail?"));
    let _ = view.clear_optimistic();
    assert_eq!(view.sync(&events).range, 0..19);

    // The assistant streams its answer over the wire.
    let wire = [
        r#"{"response_id":"resp-1","content":"The test ","reasoning_content":"look at logs"}"#,
        r#"{"response_id":"resp-1","content":"timed out."}"#,
        r#"{"response_id":"resp-1","content":"","is_complete":true}"#,
    ];
    for raw in wire {
        let chunk = StreamChunk::from_json(raw).expect("valid chunk");
        let _ = view.apply_chunk(&chunk);
    }

    let response_id = ResponseId::new("resp-1");
    assert_eq!(view.streams().content(&response_id), "The test timed out.");
    assert_eq!(view.streams().reasoning_content(&response_id), "look at logs");

    let state = view.sync(&events);
    assert_eq!(view.window().mode(), RenderMode::Virtualized);
    assert_eq!(state.range.end, 20);
    assert!(state.stick_to_bottom);
    assert_eq!(
        view.take_scroll_request(),
        Some(ScrollRequest {
            index: 19,
            behavior: ScrollBehavior::Smooth,
        })
    );

    // Late chunk after completion is rejected and leaves content intact.
    assert_eq!(
        view.append_chunk(&response_id, " extra", None),
        AppendOutcome::RejectedLate
    );
    assert_eq!(view.streams().content(&response_id), "The test timed out.");

    // Search sees the in-flight answer as well as both schemas.
    let snapshot = view.set_query("TIMED OUT", &events);
    assert_eq!(snapshot.result_indices, vec![19]);
    assert_eq!(view.set_query("fail", &events).result_indices, vec![18]);

    // The finalized event replaces the stream without duplicating it.
    events.push(
        Event::new(
            EventId::new(19),
            EventKind::Message,
            SchemaVersion::Current,
            json!({ "content": "The test timed out.", "reasoning_content": "look at logs" }),
        )
        .with_response_id("resp-1"),
    );
    assert_eq!(view.sync(&events).range.end, 20);
    assert_eq!(view.release_finalized(&events), 1);
    let merged = view.merged(&events);
    assert_eq!(merged.len(), 20);
    assert!(merged.iter().all(|entry| !entry.is_in_progress()));
    assert_eq!(
        merged.last().map(MergedEntry::key),
        Some(EntryKey::Event(EventId::new(19)))
    );

    assert_eq!(
        *changes.borrow(),
        vec![
            StreamChange::Started(response_id.clone()),
            StreamChange::Appended(response_id.clone()),
            StreamChange::Appended(response_id.clone()),
            StreamChange::Completed(response_id.clone()),
            StreamChange::LateChunkRejected(response_id.clone()),
            StreamChange::Cleared(response_id),
        ]
    );

    view.close();
}

#[test]
fn manual_scroll_holds_position_while_output_streams() {
    let mut view = ConversationView::open(ConversationId::new(2), settings());
    let events = (0..100)
        .map(|id| legacy_observation(id, "line"))
        .collect::<Vec<_>>();
    let _ = view.set_viewport_height(200.0);
    let _ = view.sync(&events);
    let _ = view.take_scroll_request();

    let state = view.on_scroll(1_000.0);
    assert!(!state.stick_to_bottom);
    assert_eq!(state.range, 23..33);

    let response_id = ResponseId::new("late");
    for delta in ["a", "b", "c"] {
        let _ = view.append_chunk(&response_id, delta, None);
        let state = view.sync(&events);
        assert_eq!(state.range, 23..33);
        assert_eq!(view.take_scroll_request(), None);
    }

    let max_offset = view.window().max_scroll_offset();
    assert!(view.on_scroll(max_offset).stick_to_bottom);
}
