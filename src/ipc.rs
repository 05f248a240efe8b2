//! Process and pipe plumbing for talking to sqinn.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   stdin: request frames    ┌─────────────────────┐
//! │   Rust client   │ ─────────────────────────► │       sqinn         │
//! │    (Sqinn)      │ ◄───────────────────────── │  (SQLite + opcodes) │
//! └─────────────────┘   stdout: response frames  └─────────────────────┘
//!          ▲                                                │
//!          └──────────── stderr: diagnostic lines ──────────┘
//!                        (drained into a Logger)
//! ```
//!
//! - `framing` - length-prefixed request/response exchange (`Transport`)
//! - `process` - spawning sqinn, stderr drain, waiting for exit

pub mod framing;
pub mod process;

pub use framing::{read_frame, write_frame, Transport};
pub use process::{launch, ChildProcess, Options, DEFAULT_SQINN_PATH, SQINN_PATH_ENV};
