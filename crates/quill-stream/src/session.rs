//! StreamSession: one decoding run bound to one open response body.
//!
//! Owns the frame buffer, the UTF-8 decoder and the accumulated answer, and
//! drives them from a pull loop over the transport's byte stream.

use std::error::Error as StdError;

use futures_util::{Stream, StreamExt};
use quill_core::{RawFallback, SessionId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::classify::{classify, Event};
use crate::error::{Result, StreamError};
use crate::extract::Extractor;
use crate::frame::{DecodeMode, FrameBuffer};
use crate::sink::{self, DeltaSink};
use crate::utf8::Utf8Decoder;

/// Lifecycle of a session.
///
/// `Open → Reading → Flushing → Closed`, or `Failed` when the transport
/// gives out. Decoding itself never fails a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Reading,
    Flushing,
    Closed,
    Failed,
}

/// Result of a completed (or cancelled) session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub session_id: SessionId,
    /// Every delta concatenated in arrival order, trimmed once at the ends.
    pub answer: String,
    /// Number of non-empty deltas delivered.
    pub deltas: usize,
    pub heartbeats: usize,
    pub saw_terminator: bool,
    /// Deliveries the sink rejected or panicked on.
    pub sink_failures: usize,
    /// The read was aborted by cancellation; `answer` is partial.
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    mode: DecodeMode,
    state: SessionState,
    utf8: Utf8Decoder,
    frames: FrameBuffer,
    extractor: Extractor,
    accumulated: String,
    deltas: usize,
    heartbeats: usize,
    saw_terminator: bool,
    sink_failures: usize,
}

impl StreamSession {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            state: SessionState::Open,
            utf8: Utf8Decoder::new(),
            frames: FrameBuffer::new(mode),
            extractor: Extractor::default(),
            accumulated: String::new(),
            deltas: 0,
            heartbeats: 0,
            saw_terminator: false,
            sink_failures: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: RawFallback) -> Self {
        self.extractor = Extractor::new(fallback);
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Answer text so far, untrimmed.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// The transport reported failure before (or while) reading.
    pub fn mark_failed(&mut self) {
        self.state = SessionState::Failed;
    }

    /// Decode one chunk of raw bytes and deliver every delta it completes.
    pub fn feed<K: DeltaSink + ?Sized>(&mut self, bytes: &[u8], sink: &mut K) {
        let text = self.utf8.decode(bytes);
        self.feed_str(&text, sink);
    }

    /// Like [`feed`](Self::feed) for text that is already decoded.
    pub fn feed_str<K: DeltaSink + ?Sized>(&mut self, text: &str, sink: &mut K) {
        match self.state {
            SessionState::Open => self.state = SessionState::Reading,
            SessionState::Reading => {}
            state => {
                warn!(session = %self.id, ?state, "chunk fed to inactive session, ignoring");
                return;
            }
        }

        for frame in self.frames.feed(text) {
            self.dispatch(&frame, sink);
        }
    }

    /// End of stream: flush what is left and close the session.
    pub fn finish<K: DeltaSink + ?Sized>(mut self, sink: &mut K) -> StreamOutcome {
        self.state = SessionState::Flushing;

        if let Some(tail) = self.utf8.finish() {
            for frame in self.frames.feed(&tail) {
                self.dispatch(&frame, sink);
            }
        }
        if let Some(frame) = self.frames.flush() {
            debug!(session = %self.id, len = frame.len(), "flushing unterminated frame");
            self.dispatch(&frame, sink);
        }

        self.state = SessionState::Closed;
        self.into_outcome(false)
    }

    /// Abandon the session without flushing. Frames still buffered are
    /// discarded; the answer so far is returned flagged as cancelled.
    pub fn cancel(mut self) -> StreamOutcome {
        self.state = SessionState::Closed;
        self.into_outcome(true)
    }

    /// Pull every chunk from `body` until it is exhausted.
    ///
    /// A read error is returned as-is: the answer's completion state is
    /// unknown and no partial result is handed back.
    pub async fn drive<S, B, E, K>(self, body: S, sink: &mut K) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn StdError + Send + Sync>>,
        K: DeltaSink + ?Sized,
    {
        self.run(body, sink, None).await
    }

    /// Like [`drive`](Self::drive), but stops reading as soon as `cancel`
    /// fires and returns the partial answer flagged as cancelled.
    pub async fn drive_cancellable<S, B, E, K>(
        self,
        body: S,
        sink: &mut K,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn StdError + Send + Sync>>,
        K: DeltaSink + ?Sized,
    {
        self.run(body, sink, Some(cancel)).await
    }

    /// Pull-style alternative to a sink: yields each delta as it is decoded.
    pub fn into_delta_stream<S, B, E>(mut self, body: S) -> impl Stream<Item = Result<String>>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        async_stream::try_stream! {
            let mut body = std::pin::pin!(body);
            let mut batch: Vec<String> = Vec::new();

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(StreamError::read)?;
                self.feed(chunk.as_ref(), &mut batch);
                for delta in batch.drain(..) {
                    yield delta;
                }
            }

            let outcome = self.finish(&mut batch);
            debug!(session = %outcome.session_id, deltas = outcome.deltas, "delta stream finished");
            for delta in batch {
                yield delta;
            }
        }
    }

    #[instrument(skip_all, fields(session = %self.id, mode = ?self.mode))]
    async fn run<S, B, E, K>(
        mut self,
        body: S,
        sink: &mut K,
        cancel: Option<CancellationToken>,
    ) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn StdError + Send + Sync>>,
        K: DeltaSink + ?Sized,
    {
        let mut body = std::pin::pin!(body);
        let cancelled = async {
            match &cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let mut cancelled = std::pin::pin!(cancelled);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut cancelled => {
                    info!(deltas = self.deltas, "stream cancelled, discarding pending input");
                    return Ok(self.cancel());
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.as_ref().len(), "chunk received");
                    self.feed(chunk.as_ref(), sink);
                }
                Some(Err(e)) => {
                    let err = StreamError::read(e);
                    warn!(error = %err, deltas = self.deltas, "stream read failed");
                    self.mark_failed();
                    return Err(err);
                }
                None => {
                    let outcome = self.finish(sink);
                    info!(
                        deltas = outcome.deltas,
                        chars = outcome.answer.chars().count(),
                        saw_terminator = outcome.saw_terminator,
                        "stream complete"
                    );
                    return Ok(outcome);
                }
            }
        }
    }

    fn dispatch<K: DeltaSink + ?Sized>(&mut self, frame: &str, sink: &mut K) {
        match classify(frame, self.mode) {
            None => {}
            Some(Event::Heartbeat) => {
                self.heartbeats += 1;
                trace!(session = %self.id, "heartbeat");
            }
            Some(Event::Terminator) => {
                self.saw_terminator = true;
                debug!(session = %self.id, "terminator received");
            }
            Some(Event::Content(raw)) => {
                let delta = self.extractor.extract(&raw, self.mode.is_plain());
                if delta.is_empty() {
                    return;
                }
                self.accumulated.push_str(&delta);
                self.deltas += 1;
                if !sink::deliver(sink, &delta) {
                    self.sink_failures += 1;
                }
            }
        }
    }

    fn into_outcome(self, cancelled: bool) -> StreamOutcome {
        StreamOutcome {
            answer: self.accumulated.trim().to_string(),
            session_id: self.id,
            deltas: self.deltas,
            heartbeats: self.heartbeats,
            saw_terminator: self.saw_terminator,
            sink_failures: self.sink_failures,
            cancelled,
        }
    }
}
