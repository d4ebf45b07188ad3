//! Delivery Sink: hands each delta to the caller.
//!
//! A consumer that fails, by returning an error or by panicking, must not
//! stop decoding. `deliver` is the single call site and contains both.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;
use tracing::warn;

/// Error a sink may report; it is logged and discarded.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receives deltas synchronously, in arrival order.
pub trait DeltaSink {
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError>;
}

/// Closure return types accepted by [`from_fn`].
pub trait IntoSinkResult {
    fn into_sink_result(self) -> Result<(), SinkError>;
}

impl IntoSinkResult for () {
    fn into_sink_result(self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<E: Into<SinkError>> IntoSinkResult for Result<(), E> {
    fn into_sink_result(self) -> Result<(), SinkError> {
        self.map_err(Into::into)
    }
}

/// Sink backed by a closure; see [`from_fn`].
pub struct FnSink<F>(F);

/// Wrap a closure returning `()` or `Result<(), E>` as a [`DeltaSink`].
///
/// ```rust
/// use quill_stream::DeltaSink;
///
/// let mut out = String::new();
/// let mut sink = quill_stream::from_fn(|delta: &str| out.push_str(delta));
/// sink.deliver("hi").unwrap();
/// ```
pub fn from_fn<F, R>(f: F) -> FnSink<F>
where
    F: FnMut(&str) -> R,
    R: IntoSinkResult,
{
    FnSink(f)
}

impl<F, R> DeltaSink for FnSink<F>
where
    F: FnMut(&str) -> R,
    R: IntoSinkResult,
{
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError> {
        (self.0)(delta).into_sink_result()
    }
}

impl DeltaSink for Vec<String> {
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError> {
        self.push(delta.to_string());
        Ok(())
    }
}

impl DeltaSink for String {
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError> {
        self.push_str(delta);
        Ok(())
    }
}

/// Forwards deltas to another task. A dropped receiver is a sink failure.
impl DeltaSink for mpsc::UnboundedSender<String> {
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError> {
        self.send(delta.to_string())
            .map_err(|_| "delta receiver dropped".into())
    }
}

impl<S: DeltaSink + ?Sized> DeltaSink for &mut S {
    fn deliver(&mut self, delta: &str) -> Result<(), SinkError> {
        (**self).deliver(delta)
    }
}

/// Invoke the sink once, swallowing any error or panic. Returns whether the
/// sink accepted the delta.
pub(crate) fn deliver<S: DeltaSink + ?Sized>(sink: &mut S, delta: &str) -> bool {
    match catch_unwind(AssertUnwindSafe(|| sink.deliver(delta))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "delta sink failed, continuing");
            false
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(%reason, "delta sink panicked, continuing");
            false
        }
    }
}
