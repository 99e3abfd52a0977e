use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use transcript::logging::init_tracing;
use transcript::{
    ChunkError, ConversationId, ConversationView, Event, LocalMessage, LocalMessageId,
    SettingsError, SettingsStore, StreamChunk, WindowState,
};

#[derive(Debug, Clone)]
struct ReplayArgs {
    fixture: PathBuf,
    settings: Option<PathBuf>,
    conversation: ConversationId,
}

/// One line of a replay fixture.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ReplayStep {
    Event { event: Event },
    /// Raw wire chunk, decoded the same way the transport would.
    Chunk { chunk: serde_json::Value },
    Optimistic { id: u64, text: String },
    Acknowledge,
    Finalize,
    Viewport { height: f32 },
    Scroll { offset: f32 },
    ScrollToEnd,
    Measure { index: usize, height: f32 },
    Search { query: String },
    Next,
    Previous,
}

impl ReplayStep {
    fn name(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Chunk { .. } => "chunk",
            Self::Optimistic { .. } => "optimistic",
            Self::Acknowledge => "acknowledge",
            Self::Finalize => "finalize",
            Self::Viewport { .. } => "viewport",
            Self::Scroll { .. } => "scroll",
            Self::ScrollToEnd => "scroll_to_end",
            Self::Measure { .. } => "measure",
            Self::Search { .. } => "search",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

#[derive(Debug, Snafu)]
enum ReplayError {
    #[snafu(display("missing required --fixture argument"))]
    MissingFixture { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("invalid conversation id '{raw}'"))]
    InvalidConversation {
        stage: &'static str,
        raw: String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("file operation failed at {path:?}: {source}"))]
    FileIo {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("fixture line {line} is not a valid step: {source}"))]
    DecodeStep {
        stage: &'static str,
        line: usize,
        source: serde_json::Error,
    },
    #[snafu(display("fixture line {line} carries an invalid chunk: {source}"))]
    InvalidChunk {
        stage: &'static str,
        line: usize,
        source: ChunkError,
    },
    #[snafu(display("failed to load settings: {source}"))]
    LoadSettings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("fixture producer task failed: {source}"))]
    ProducerJoin {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

type ReplayResult<T> = Result<T, ReplayError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    if let Err(error) = run().await {
        println!("replay_ok=false");
        eprintln!("replay_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> ReplayResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("fixture={}", args.fixture.display());

    // An explicit settings file must parse; the default location may be absent or stale.
    let store = match args.settings {
        Some(path) => SettingsStore::open(path).context(LoadSettingsSnafu {
            stage: "open-explicit-settings",
        })?,
        None => SettingsStore::load(),
    };
    let settings = store.settings();
    println!(
        "settings full_render_threshold={} overscan={} at_bottom_threshold_px={}",
        settings.full_render_threshold, settings.overscan, settings.at_bottom_threshold_px
    );

    let (sender, receiver) = mpsc::unbounded_channel();
    let producer = tokio::spawn(read_fixture(args.fixture, sender));

    let mut view = ConversationView::open(args.conversation, settings);
    let applied = consume_steps(&mut view, receiver).await?;
    let read = producer.await.context(ProducerJoinSnafu {
        stage: "join-fixture-producer",
    })??;

    println!("steps_read={read} steps_applied={applied}");
    view.close();
    println!("replay_ok=true");
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> ReplayResult<ReplayArgs> {
    let mut fixture = None;
    let mut settings = None;
    let mut conversation = ConversationId::new(1);
    let mut pending = args.into_iter();

    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--fixture" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-fixture-value",
                    arg: "--fixture",
                })?;
                fixture = Some(PathBuf::from(value));
            }
            "--settings" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-settings-value",
                    arg: "--settings",
                })?;
                settings = Some(PathBuf::from(value));
            }
            "--conversation" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-conversation-value",
                    arg: "--conversation",
                })?;
                let raw = value.parse::<u64>().context(InvalidConversationSnafu {
                    stage: "parse-args-conversation",
                    raw: value.clone(),
                })?;
                conversation = ConversationId::new(raw);
            }
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args-unknown",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    Ok(ReplayArgs {
        fixture: fixture.context(MissingFixtureSnafu {
            stage: "parse-args-fixture",
        })?,
        settings,
        conversation,
    })
}

/// Producer side: decodes fixture lines and forwards them in file order.
async fn read_fixture(
    path: PathBuf,
    sender: mpsc::UnboundedSender<(usize, ReplayStep)>,
) -> ReplayResult<usize> {
    let file = tokio::fs::File::open(&path).await.context(FileIoSnafu {
        stage: "open-fixture",
        path: path.clone(),
    })?;
    let mut lines = BufReader::new(file).lines();
    let mut line_number = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await.context(FileIoSnafu {
        stage: "read-fixture-line",
        path: path.clone(),
    })? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let step = serde_json::from_str::<ReplayStep>(trimmed).context(DecodeStepSnafu {
            stage: "decode-fixture-step",
            line: line_number,
        })?;
        if sender.send((line_number, step)).is_err() {
            tracing::warn!(line = line_number, "replay consumer stopped early");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

/// Consumer side: the only owner of the view, applying steps in order.
async fn consume_steps(
    view: &mut ConversationView,
    mut receiver: mpsc::UnboundedReceiver<(usize, ReplayStep)>,
) -> ReplayResult<usize> {
    let mut events: Vec<Event> = Vec::new();
    let mut applied = 0usize;

    while let Some((line, step)) = receiver.recv().await {
        let name = step.name();
        let state = apply_step(view, &mut events, line, step)?;
        applied += 1;

        println!(
            "step={applied} op={name} len={} range={}..{} stick_to_bottom={} mode={:?}",
            view.window().len(),
            state.range.start,
            state.range.end,
            state.stick_to_bottom,
            view.window().mode(),
        );
        if let Some(request) = view.take_scroll_request() {
            println!(
                "scroll_request index={} behavior={:?}",
                request.index, request.behavior
            );
        }
    }

    Ok(applied)
}

fn apply_step(
    view: &mut ConversationView,
    events: &mut Vec<Event>,
    line: usize,
    step: ReplayStep,
) -> ReplayResult<WindowState> {
    let state = match step {
        ReplayStep::Event { event } => {
            events.push(event);
            view.sync(events)
        }
        ReplayStep::Chunk { chunk } => {
            let chunk = StreamChunk::from_json(&chunk.to_string()).context(InvalidChunkSnafu {
                stage: "decode-fixture-chunk",
                line,
            })?;
            let outcome = view.apply_chunk(&chunk);
            println!(
                "chunk response_id={} append={:?} completed={} content_len={}",
                chunk.response_id,
                outcome.append,
                outcome.completed,
                view.streams().content(&chunk.response_id).len()
            );
            view.sync(events)
        }
        ReplayStep::Optimistic { id, text } => {
            view.set_optimistic(LocalMessage::new(LocalMessageId::new(id), text));
            view.sync(events)
        }
        ReplayStep::Acknowledge => {
            let _ = view.clear_optimistic();
            view.sync(events)
        }
        ReplayStep::Finalize => {
            let released = view.release_finalized(events);
            println!("finalize released={released}");
            view.sync(events)
        }
        ReplayStep::Viewport { height } => view.set_viewport_height(height),
        ReplayStep::Scroll { offset } => view.on_scroll(offset),
        ReplayStep::ScrollToEnd => view.scroll_to_end(),
        ReplayStep::Measure { index, height } => {
            let _ = view.record_item_height(index, height);
            view.window_state()
        }
        ReplayStep::Search { query } => {
            let snapshot = view.set_query(&query, events);
            println!(
                "search query={query:?} result_indices={:?} current_result_pointer={}",
                snapshot.result_indices, snapshot.current_result_pointer
            );
            view.window_state()
        }
        ReplayStep::Next => {
            let target = view.next_result();
            print_navigation(view, target)
        }
        ReplayStep::Previous => {
            let target = view.previous_result();
            print_navigation(view, target)
        }
    };

    Ok(state)
}

fn print_navigation(view: &ConversationView, target: Option<usize>) -> WindowState {
    println!(
        "search current_result_pointer={} target={target:?}",
        view.search_snapshot().current_result_pointer
    );
    view.window_state()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_required_and_optional_arguments() {
        let parsed = parse_args(args(&[
            "--fixture",
            "session.jsonl",
            "--settings",
            "view.json",
            "--conversation",
            "9",
        ]))
        .expect("valid arguments");

        assert_eq!(parsed.fixture, PathBuf::from("session.jsonl"));
        assert_eq!(parsed.settings, Some(PathBuf::from("view.json")));
        assert_eq!(parsed.conversation, ConversationId::new(9));
    }

    #[test]
    fn rejects_missing_fixture_and_unknown_flags() {
        assert!(matches!(
            parse_args(args(&[])),
            Err(ReplayError::MissingFixture { .. })
        ));
        assert!(matches!(
            parse_args(args(&["--fixture", "a", "--verbose"])),
            Err(ReplayError::UnknownArgument { .. })
        ));
        assert!(matches!(
            parse_args(args(&["--fixture"])),
            Err(ReplayError::MissingArgumentValue { .. })
        ));
    }

    #[test]
    fn decodes_fixture_steps() {
        let step: ReplayStep = serde_json::from_str(
            r#"{"op":"chunk","chunk":{"response_id":"r1","content":"Hel"}}"#,
        )
        .expect("chunk step");
        assert_eq!(step.name(), "chunk");

        let step: ReplayStep =
            serde_json::from_str(r#"{"op":"scroll_to_end"}"#).expect("unit step");
        assert_eq!(step.name(), "scroll_to_end");
    }

    #[tokio::test]
    async fn replays_a_fixture_end_to_end() {
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("streaming_session.jsonl");
        let (sender, receiver) = mpsc::unbounded_channel();
        let producer = tokio::spawn(read_fixture(fixture, sender));

        let mut view = ConversationView::open(
            ConversationId::new(1),
            Arc::new(transcript::ViewSettings::default()),
        );
        let applied = consume_steps(&mut view, receiver)
            .await
            .expect("fixture applies");
        let read = producer
            .await
            .expect("producer joins")
            .expect("fixture reads");

        assert_eq!(applied, read);
        assert!(view.streams().is_empty());
        assert_eq!(view.search_snapshot().result_indices, vec![1, 3]);
        assert_eq!(view.search_snapshot().current_result_pointer, 1);
    }
}
