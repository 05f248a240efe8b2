//! Async client for sqinn.
//!
//! sqinn is a small executable that exposes SQLite over its standard input
//! and output using a binary request/response protocol. This crate launches
//! sqinn as a child process and drives it:
//!
//! - `client` - the `Sqinn` handle: one method per opcode, plus `exec` and
//!   `query` which run whole statements in a single round trip
//! - `ipc` - framing over the pipes and process supervision
//! - `codec` - primitive wire encodings
//! - `value` - `Value`, `ValueType` and `Row`
//! - `logger` - sinks for sqinn's stderr diagnostics
//!
//! ```ignore
//! use sqinn_client::{Options, Sqinn, TracingLogger, ValueType};
//!
//! let sq = Sqinn::launch(Options::from_env().logger(TracingLogger))?;
//! sq.open(":memory:").await?;
//! sq.exec_one("CREATE TABLE t (a INTEGER, b TEXT)").await?;
//! sq.exec_one("INSERT INTO t VALUES (1, 'x')").await?;
//! let rows = sq
//!     .query("SELECT a, b FROM t", &[], &[ValueType::Int, ValueType::Text])
//!     .await?;
//! sq.terminate().await?;
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod ipc;
pub mod logger;
pub mod value;

pub use client::{Opcode, Sqinn, Statement};
pub use error::{Result, SqinnError};
pub use ipc::Options;
pub use logger::{Logger, NoLogger, TracingLogger};
pub use value::{Row, Value, ValueType};
