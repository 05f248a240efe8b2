//! Error types for the sqinn client.
//!
//! Every operation returns either its result or exactly one `SqinnError`;
//! no partial results accompany an error.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SqinnError>;

/// Errors surfaced by the sqinn client.
///
/// The variants fall into four groups:
/// - local validation (`InvalidParamIndex`, `InvalidIterations`,
///   `InvalidParamCount`, `ValueCountMismatch`, `CannotBind`,
///   `RequestTooLarge`), detected before any bytes are written
/// - transport (`Io`, `InvalidResponseSize`, `Truncated`), after which the
///   handle may be out of sync with the child and should be terminated
/// - remote (`Remote`), reported by sqinn through the response status flag
/// - process lifecycle (`Launch`, `Exit`)
#[derive(Debug, Error)]
pub enum SqinnError {
    /// Bind was called with a parameter index below 1.
    #[error("Bind: iparam must be >= 1 but was {0}")]
    InvalidParamIndex(i32),

    /// Exec was called with a negative iteration count.
    #[error("Exec '{sql}' niterations must be >= 0 but was {niterations}")]
    InvalidIterations { sql: String, niterations: i32 },

    /// Exec was called with a negative parameter count.
    #[error("Exec '{sql}' nparams must be >= 0 but was {nparams}")]
    InvalidParamCount { sql: String, nparams: i32 },

    /// Exec was given a value slice whose length is not `niterations * nparams`.
    #[error("Exec '{sql}' expected {expected} values but have {actual}")]
    ValueCountMismatch {
        sql: String,
        expected: i64,
        actual: usize,
    },

    /// A dynamic value has no SQLite storage class.
    #[error("cannot bind type {0}")]
    CannotBind(&'static str),

    /// The encoded request does not fit the 32-bit length prefix.
    #[error("request of {0} bytes exceeds the maximum frame size")]
    RequestTooLarge(usize),

    /// Writing to or reading from the sqinn pipes failed.
    #[error("while {op} sqinn: {source}")]
    Io {
        /// What the transport was doing, e.g. "writing to" or "reading from".
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The response length prefix was zero or negative.
    #[error("invalid response size {0}")]
    InvalidResponseSize(i32),

    /// A response payload ended before all expected fields were decoded.
    #[error("truncated response: needed {needed} bytes but only {available} left")]
    Truncated { needed: usize, available: usize },

    /// sqinn reported a failure; the message is passed through verbatim.
    #[error("sqinn: {0}")]
    Remote(String),

    /// The sqinn executable could not be started.
    #[error("cannot launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for sqinn to exit failed, or it exited unsuccessfully.
    #[error("sqinn did not exit cleanly: {0}")]
    Exit(String),
}

impl SqinnError {
    pub(crate) fn io(op: &'static str, source: std::io::Error) -> Self {
        SqinnError::Io { op, source }
    }

    pub(crate) fn exit_status(status: ExitStatus) -> Self {
        SqinnError::Exit(status.to_string())
    }

    /// True for errors raised before anything was sent to sqinn.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SqinnError::InvalidParamIndex(_)
                | SqinnError::InvalidIterations { .. }
                | SqinnError::InvalidParamCount { .. }
                | SqinnError::ValueCountMismatch { .. }
                | SqinnError::CannotBind(_)
                | SqinnError::RequestTooLarge(_)
        )
    }

    /// The remote message, if sqinn reported this error.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            SqinnError::Remote(msg) => Some(msg),
            _ => None,
        }
    }
}
