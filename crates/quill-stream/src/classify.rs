//! Event Classifier: interprets a frame according to the session's mode.

use quill_core::Framing;
use tracing::trace;

use crate::frame::DecodeMode;

/// Out-of-band end-of-stream marker sent as an event payload.
pub const TERMINATOR: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// What a frame means to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Keep-alive comment; carries nothing.
    Heartbeat,
    /// `[DONE]`; carries nothing and is never delivered.
    Terminator,
    /// A raw data string to be handed to the extractor.
    Content(String),
}

/// Classify one complete frame. `None` means the frame is ignored.
pub fn classify(frame: &str, mode: DecodeMode) -> Option<Event> {
    match mode {
        DecodeMode::Sse(Framing::Block) => classify_block(frame),
        DecodeMode::Sse(Framing::Line) => classify_line(frame),
        DecodeMode::Plain => classify_plain(frame),
    }
}

/// Strip `data:` and at most one following space.
fn data_value(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

fn payload_event(data: String) -> Event {
    if data == TERMINATOR {
        Event::Terminator
    } else {
        Event::Content(data)
    }
}

/// A block may hold several `data:` lines (merged with '\n') alongside
/// `event:`/`id:`/`retry:` fields and comments, all of which are skipped.
///
/// Comment lines are dropped one by one, so `": ping\ndata: x"` is still
/// `Content("x")`. A block with comments but no `data:` line is a heartbeat.
fn classify_block(frame: &str) -> Option<Event> {
    let mut data: Option<String> = None;
    let mut saw_comment = false;

    for line in frame.split('\n') {
        if let Some(value) = data_value(line) {
            match data.as_mut() {
                Some(joined) => {
                    joined.push('\n');
                    joined.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        } else if line.starts_with(':') {
            saw_comment = true;
        } else if !line.is_empty() {
            trace!(line, "ignoring non-data line");
        }
    }

    match data {
        Some(data) => Some(payload_event(data)),
        None if saw_comment => Some(Event::Heartbeat),
        None => None,
    }
}

fn classify_line(frame: &str) -> Option<Event> {
    if frame.starts_with(':') {
        return Some(Event::Heartbeat);
    }
    match data_value(frame) {
        Some(value) => Some(payload_event(value.to_string())),
        None => {
            trace!(line = frame, "ignoring non-data line");
            None
        }
    }
}

fn classify_plain(chunk: &str) -> Option<Event> {
    if chunk.trim() == TERMINATOR {
        Some(Event::Terminator)
    } else {
        Some(Event::Content(chunk.to_string()))
    }
}
