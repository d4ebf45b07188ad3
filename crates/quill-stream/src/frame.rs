//! Frame Buffer: splits decoded text into complete, self-contained frames.

use quill_core::Framing;

const BLOCK_SEPARATOR: &str = "\n\n";
const LINE_SEPARATOR: &str = "\n";

/// How a response body is framed. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// `text/event-stream` with the given framing.
    Sse(Framing),
    /// Any other content type: every chunk is a frame.
    Plain,
}

impl DecodeMode {
    /// Select the mode from a response's `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>, framing: Framing) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("text/event-stream") => {
                DecodeMode::Sse(framing)
            }
            _ => DecodeMode::Plain,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, DecodeMode::Plain)
    }

    fn separator(&self) -> Option<&'static str> {
        match self {
            DecodeMode::Sse(Framing::Block) => Some(BLOCK_SEPARATOR),
            DecodeMode::Sse(Framing::Line) => Some(LINE_SEPARATOR),
            DecodeMode::Plain => None,
        }
    }
}

/// Accumulates text across reads and hands out complete frames.
///
/// `pending` never holds a complete frame: every separator is consumed in the
/// same `feed` call that completes it. Because of that, a new search only has
/// to start just before the previous end of `pending`.
#[derive(Debug)]
pub struct FrameBuffer {
    mode: DecodeMode,
    pending: String,
}

impl FrameBuffer {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            pending: String::new(),
        }
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    /// Unterminated trailing text waiting for its separator.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Consume one decoded chunk, returning the frames it completes in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let Some(separator) = self.mode.separator() else {
            // plain mode: no buffering, the chunk is the frame
            return if chunk.is_empty() {
                Vec::new()
            } else {
                vec![chunk.to_string()]
            };
        };

        // CRLF → LF, including a pair split across two reads.
        if self.pending.ends_with('\r') && chunk.starts_with('\n') {
            self.pending.pop();
        }
        let mut scan_from = self.pending.len().saturating_sub(separator.len() - 1);
        while !self.pending.is_char_boundary(scan_from) {
            scan_from -= 1;
        }
        if chunk.contains('\r') {
            self.pending.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.pending.push_str(chunk);
        }

        let mut frames = Vec::new();
        let mut start = 0;
        let mut search = scan_from;
        while let Some(pos) = self.pending[search..].find(separator) {
            let end = search + pos;
            let frame = self.pending[start..end].trim_end();
            if !frame.is_empty() {
                frames.push(frame.to_string());
            }
            start = end + separator.len();
            search = start;
        }
        self.pending.drain(..start);
        frames
    }

    /// End of stream: the unterminated tail, if any, as one last frame.
    pub fn flush(&mut self) -> Option<String> {
        if self.mode.is_plain() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        let tail = tail.trim_end();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        }
    }
}
