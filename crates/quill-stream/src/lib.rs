//! quill-stream — incremental decoder for streamed generative-text responses.
//!
//! A response body arrives as arbitrary byte chunks. The pipeline is:
//!
//! ```text
//! bytes ─▶ Utf8Decoder ─▶ FrameBuffer ─▶ classify ─▶ Extractor ─┬─▶ DeltaSink
//!                                                              └─▶ accumulated answer
//! ```
//!
//! Two wire framings are supported for `text/event-stream` bodies (blank-line
//! delimited blocks and single `data:` lines); any other content type is
//! decoded in plain mode, where every chunk is delivered as-is.
//!
//! # Quick start
//!
//! ```rust
//! use quill_stream::{DecodeMode, StreamSession};
//! use quill_core::Framing;
//!
//! let mut session = StreamSession::new(DecodeMode::Sse(Framing::Block));
//! let mut deltas: Vec<String> = Vec::new();
//! session.feed(b"data: {\"content\":\"Hel\"}\n\ndata: {\"con", &mut deltas);
//! session.feed(b"tent\":\"lo\"}\n\ndata: [DONE]\n\n", &mut deltas);
//! let outcome = session.finish(&mut deltas);
//!
//! assert_eq!(deltas, vec!["Hel", "lo"]);
//! assert_eq!(outcome.answer, "Hello");
//! ```

pub mod classify;
pub mod error;
pub mod extract;
pub mod frame;
pub mod session;
pub mod sink;
pub mod utf8;

pub use classify::{classify, Event};
pub use error::{Result, StreamError};
pub use extract::{extract, Extractor};
pub use frame::{DecodeMode, FrameBuffer};
pub use session::{SessionState, StreamOutcome, StreamSession};
pub use sink::{from_fn, DeltaSink, SinkError};
pub use utf8::Utf8Decoder;
