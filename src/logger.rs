//! Sinks for sqinn's stderr output.
//!
//! sqinn writes human-readable diagnostics to stderr, one line at a time.
//! The client drains that stream in the background and hands every line to
//! a `Logger`. Implementations must return quickly: a slow sink delays the
//! drain, and a full stderr pipe will eventually block sqinn itself.

/// Accepts one line of text per call.
pub trait Logger: Send + Sync + 'static {
    fn log(&self, msg: &str);
}

/// Discards everything. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogger;

impl Logger for NoLogger {
    fn log(&self, _msg: &str) {}
}

/// Forwards each line as a `tracing` event with target `sqinn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, msg: &str) {
        tracing::info!(target: "sqinn", "{}", msg);
    }
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn log(&self, msg: &str) {
        self(msg)
    }
}
