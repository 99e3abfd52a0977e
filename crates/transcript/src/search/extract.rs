use std::borrow::Cow;
use std::fmt;

use serde_json::{Map, Value};
use snafu::{Snafu, ensure};

use crate::event::SchemaVersion;
use crate::merge::MergedEntry;

/// Flat string fields searched in legacy payloads, in output order.
const LEGACY_TEXT_FIELDS: [&str; 6] = ["message", "content", "thought", "command", "path", "code"];
/// Nesting limit for tool results that embed further content blocks.
const MAX_BLOCK_DEPTH: usize = 8;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExtractError {
    #[snafu(display("event payload is {found}, expected an object"))]
    NotAnObject {
        stage: &'static str,
        found: &'static str,
    },
    #[snafu(display("field '{field}' is {found}, expected {expected}"))]
    UnexpectedFieldType {
        stage: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[snafu(display("content block {index} is {found}, expected an object"))]
    UnexpectedBlock {
        stage: &'static str,
        index: usize,
        found: &'static str,
    },
    #[snafu(display("content blocks nest deeper than {limit} levels"))]
    NestingTooDeep { stage: &'static str, limit: usize },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Pulls searchable text fragments out of one event payload.
pub trait ContentExtractor {
    fn extract<'a>(&self, payload: &'a Value) -> ExtractResult<Vec<&'a str>>;
}

/// Extractor for the legacy schema: a handful of flat string fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyExtractor;

impl ContentExtractor for LegacyExtractor {
    fn extract<'a>(&self, payload: &'a Value) -> ExtractResult<Vec<&'a str>> {
        let object = as_object(payload, "legacy-payload")?;
        let mut parts = Vec::new();

        for field in LEGACY_TEXT_FIELDS {
            if let Some(text) = optional_str(object, field, "legacy-field")? {
                parts.push(text);
            }
        }

        Ok(parts)
    }
}

/// Extractor for the current schema.
///
/// Flattens `content` (a string or a list of typed blocks, possibly nested via
/// tool results), an optional `llm_message` wrapper, and the reasoning fields
/// `reasoning_content` and `thinking_blocks`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl ContentExtractor for StructuredExtractor {
    fn extract<'a>(&self, payload: &'a Value) -> ExtractResult<Vec<&'a str>> {
        let mut parts = Vec::new();
        collect_message(as_object(payload, "structured-payload")?, &mut parts, 0)?;
        Ok(parts)
    }
}

fn collect_message<'a>(
    object: &'a Map<String, Value>,
    parts: &mut Vec<&'a str>,
    depth: usize,
) -> ExtractResult<()> {
    if let Some(wrapped) = object.get("llm_message").filter(|value| !value.is_null()) {
        ensure!(
            depth < MAX_BLOCK_DEPTH,
            NestingTooDeepSnafu {
                stage: "structured-llm-message",
                limit: MAX_BLOCK_DEPTH,
            }
        );
        collect_message(as_object(wrapped, "structured-llm-message")?, parts, depth + 1)?;
    }

    if let Some(content) = object.get("content") {
        collect_content(content, "content", parts, depth)?;
    }

    if let Some(reasoning) = optional_str(object, "reasoning_content", "structured-reasoning")? {
        parts.push(reasoning);
    }

    match object.get("thinking_blocks") {
        None | Some(Value::Null) => {}
        Some(Value::Array(blocks)) => {
            for (index, block) in blocks.iter().enumerate() {
                let block = as_block(block, index)?;
                if let Some(thinking) = optional_str(block, "thinking", "structured-thinking")? {
                    parts.push(thinking);
                }
            }
        }
        Some(other) => {
            return UnexpectedFieldTypeSnafu {
                stage: "structured-thinking-blocks",
                field: "thinking_blocks",
                expected: "an array",
                found: json_type(other),
            }
            .fail();
        }
    }

    Ok(())
}

fn collect_content<'a>(
    content: &'a Value,
    field: &'static str,
    parts: &mut Vec<&'a str>,
    depth: usize,
) -> ExtractResult<()> {
    ensure!(
        depth < MAX_BLOCK_DEPTH,
        NestingTooDeepSnafu {
            stage: "structured-content",
            limit: MAX_BLOCK_DEPTH,
        }
    );

    match content {
        Value::Null => Ok(()),
        Value::String(text) => {
            parts.push(text);
            Ok(())
        }
        Value::Array(blocks) => {
            for (index, block) in blocks.iter().enumerate() {
                collect_block(as_block(block, index)?, parts, depth)?;
            }
            Ok(())
        }
        other => UnexpectedFieldTypeSnafu {
            stage: "structured-content",
            field,
            expected: "a string or an array of blocks",
            found: json_type(other),
        }
        .fail(),
    }
}

fn collect_block<'a>(
    block: &'a Map<String, Value>,
    parts: &mut Vec<&'a str>,
    depth: usize,
) -> ExtractResult<()> {
    let block_type = optional_str(block, "type", "structured-block-type")?.unwrap_or("text");
    let text = match block_type {
        "text" | "input_text" | "output_text" | "reasoning" => {
            optional_str(block, "text", "structured-block-text")?
        }
        "thinking" => optional_str(block, "thinking", "structured-block-thinking")?,
        "tool_call" => optional_str(block, "arguments", "structured-block-arguments")?,
        "tool_result" => {
            if let Some(nested) = block.get("content") {
                collect_content(nested, "content", parts, depth + 1)?;
            }
            None
        }
        // Images, files, and unknown blocks carry no searchable text.
        _ => None,
    };

    parts.extend(text);
    Ok(())
}

fn as_object<'a>(value: &'a Value, stage: &'static str) -> ExtractResult<&'a Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        other => NotAnObjectSnafu {
            stage,
            found: json_type(other),
        }
        .fail(),
    }
}

fn as_block(value: &Value, index: usize) -> ExtractResult<&Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        other => UnexpectedBlockSnafu {
            stage: "structured-block",
            index,
            found: json_type(other),
        }
        .fail(),
    }
}

/// Missing and null are both "absent"; any other non-string is malformed.
fn optional_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    stage: &'static str,
) -> ExtractResult<Option<&'a str>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => UnexpectedFieldTypeSnafu {
            stage,
            field,
            expected: "a string",
            found: json_type(other),
        }
        .fail(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extractor strategies keyed by schema version.
pub struct Extractors {
    legacy: Box<dyn ContentExtractor>,
    current: Box<dyn ContentExtractor>,
}

impl Extractors {
    pub fn new(
        legacy: impl ContentExtractor + 'static,
        current: impl ContentExtractor + 'static,
    ) -> Self {
        Self {
            legacy: Box::new(legacy),
            current: Box::new(current),
        }
    }

    pub fn for_version(&self, version: SchemaVersion) -> &dyn ContentExtractor {
        match version {
            SchemaVersion::Legacy => self.legacy.as_ref(),
            SchemaVersion::Current => self.current.as_ref(),
        }
    }

    /// Searchable text of one merged entry.
    ///
    /// Returns `None` when a finalized event cannot be extracted; the failure
    /// is logged and the entry simply contributes nothing.
    pub fn entry_text<'a>(&self, entry: &MergedEntry<'a>) -> Option<Cow<'a, str>> {
        match *entry {
            MergedEntry::Finalized(event) => {
                match self.for_version(event.version).extract(&event.payload) {
                    Ok(parts) => Some(join_parts(parts)),
                    Err(error) => {
                        tracing::debug!(
                            event_id = %event.id,
                            version = ?event.version,
                            %error,
                            "skipping unextractable event"
                        );
                        None
                    }
                }
            }
            MergedEntry::InProgress(message) => {
                let parts = [message.content(), message.reasoning_content()]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect();
                Some(join_parts(parts))
            }
            MergedEntry::Optimistic(message) => Some(Cow::Borrowed(message.text.as_str())),
        }
    }
}

impl Default for Extractors {
    fn default() -> Self {
        Self::new(LegacyExtractor, StructuredExtractor)
    }
}

impl fmt::Debug for Extractors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Extractors").finish_non_exhaustive()
    }
}

fn join_parts(parts: Vec<&str>) -> Cow<'_, str> {
    match parts.as_slice() {
        [] => Cow::Borrowed(""),
        [single] => Cow::Borrowed(*single),
        _ => Cow::Owned(parts.join("\n")),
    }
}
