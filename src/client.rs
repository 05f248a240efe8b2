//! The sqinn handle and one method per protocol opcode.
//!
//! Every method takes the handle's lock for the whole request/response
//! exchange, so concurrent callers never interleave frames on the pipe.
//! sqinn also allows only one prepared statement at a time; the low-level
//! `prepare`/`bind`/`step`/.../`finalize` methods leave that discipline to
//! the caller, while `prepare_statement` enforces it by holding the lock
//! until the statement is finalized.
//!
//! # Usage
//!
//! ```ignore
//! use sqinn_client::{Options, Sqinn, Value, ValueType};
//!
//! let sq = Sqinn::launch(Options::from_env())?;
//! sq.open(":memory:").await?;
//! sq.exec_one("CREATE TABLE users (id INTEGER, name TEXT)").await?;
//! sq.exec(
//!     "INSERT INTO users (id, name) VALUES (?, ?)",
//!     2,
//!     2,
//!     &[Value::from(1), Value::from("alice"), Value::from(2), Value::from("bob")],
//! )
//! .await?;
//! let rows = sq
//!     .query("SELECT id, name FROM users ORDER BY id", &[], &[ValueType::Int, ValueType::Text])
//!     .await?;
//! sq.close().await?;
//! sq.terminate().await?;
//! ```

mod bulk;
mod must;
mod statement;

pub use statement::Statement;

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec::{decode_bool, decode_byte, decode_i32, decode_string, encode_i32, encode_str};
use crate::error::{Result, SqinnError};
use crate::ipc::framing::Transport;
use crate::ipc::process::{self, Options};
use crate::value::{Value, ValueType};

/// Protocol function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    SqinnVersion = 1,
    IoVersion = 2,
    SqliteVersion = 3,
    Open = 10,
    Prepare = 11,
    Bind = 12,
    Step = 13,
    Reset = 14,
    Changes = 15,
    Column = 16,
    Finalize = 17,
    Close = 18,
    Exec = 51,
    Query = 52,
}

impl Opcode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            1 => Opcode::SqinnVersion,
            2 => Opcode::IoVersion,
            3 => Opcode::SqliteVersion,
            10 => Opcode::Open,
            11 => Opcode::Prepare,
            12 => Opcode::Bind,
            13 => Opcode::Step,
            14 => Opcode::Reset,
            15 => Opcode::Changes,
            16 => Opcode::Column,
            17 => Opcode::Finalize,
            18 => Opcode::Close,
            51 => Opcode::Exec,
            52 => Opcode::Query,
            _ => return None,
        })
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Everything guarded by the protocol lock.
pub(crate) struct Session {
    /// `None` once terminated.
    transport: Option<Transport<BoxedWriter, BoxedReader>>,
    /// The child and its stderr drain; `None` for caller-supplied streams.
    process: Option<(Child, JoinHandle<()>)>,
    /// Set while an exchange is under way. Still set on entry means an
    /// earlier call was dropped before its response was read.
    in_flight: bool,
}

impl Session {
    fn new(
        transport: Transport<BoxedWriter, BoxedReader>,
        process: Option<(Child, JoinHandle<()>)>,
    ) -> Self {
        Self {
            transport: Some(transport),
            process,
            in_flight: false,
        }
    }

    /// One request/response exchange.
    ///
    /// Once a call has been cancelled mid-exchange its response may still be
    /// queued on the pipe, so every later call fails without sending.
    pub(crate) async fn call(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let transport = self.transport.as_mut().ok_or_else(terminated)?;
        if self.in_flight {
            return Err(desynchronized());
        }
        self.in_flight = true;
        let result = transport.write_and_read(request).await;
        self.in_flight = false;
        result
    }
}

fn boxed_transport<W, R>(writer: W, reader: R) -> Transport<BoxedWriter, BoxedReader>
where
    W: AsyncWrite + Send + Unpin + 'static,
    R: AsyncRead + Send + Unpin + 'static,
{
    let writer: BoxedWriter = Box::new(writer);
    let reader: BoxedReader = Box::new(reader);
    Transport::new(writer, reader)
}

fn desynchronized() -> SqinnError {
    SqinnError::io(
        "reading from",
        io::Error::new(
            io::ErrorKind::InvalidData,
            "a cancelled request left its response unread; terminate sqinn",
        ),
    )
}

fn terminated() -> SqinnError {
    SqinnError::io(
        "writing to",
        io::Error::new(io::ErrorKind::BrokenPipe, "sqinn has been terminated"),
    )
}

/// Start a request with its opcode byte.
pub(crate) fn request(op: Opcode, capacity: usize) -> Vec<u8> {
    let mut req = Vec::with_capacity(1 + capacity);
    req.push(op.as_byte());
    req
}

pub(crate) fn string_request(op: Opcode, s: &str) -> Vec<u8> {
    let mut req = request(op, 4 + s.len());
    encode_str(&mut req, s);
    req
}

pub(crate) fn bind_request(iparam: i32, value: &Value) -> Result<Vec<u8>> {
    if iparam < 1 {
        return Err(SqinnError::InvalidParamIndex(iparam));
    }
    let mut req = request(Opcode::Bind, 16);
    encode_i32(&mut req, iparam);
    value.encode(&mut req);
    Ok(req)
}

pub(crate) fn column_request(icol: i32, col_type: ValueType) -> Vec<u8> {
    let mut req = request(Opcode::Column, 5);
    encode_i32(&mut req, icol);
    req.push(col_type.as_byte());
    req
}

/// A running sqinn instance.
///
/// `Sqinn` is `Send + Sync`; share it with `Arc` to issue requests from
/// several tasks. Requests are served one at a time.
///
/// Dropping a launched `Sqinn` without `terminate` kills the child.
pub struct Sqinn {
    session: Mutex<Session>,
}

impl Sqinn {
    /// Launch a sqinn child process.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SqinnError::Launch` if sqinn cannot be started.
    pub fn launch(options: Options) -> Result<Self> {
        let child = process::launch(&options)?;
        Ok(Self::with_session(Session::new(
            boxed_transport(child.stdin, child.stdout),
            Some((child.child, child.drain)),
        )))
    }

    /// Speak the protocol over already-connected streams instead of a child
    /// process, e.g. a sqinn instance reached through some other channel.
    ///
    /// `terminate` sends the shutdown frame and closes `writer`.
    pub fn from_streams<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_session(Session::new(boxed_transport(writer, reader), None))
    }

    fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// Lock the pipe and do one exchange.
    async fn call(&self, request: &[u8]) -> Result<Vec<u8>> {
        self.session.lock().await.call(request).await
    }

    /// Version of the sqinn executable.
    pub async fn sqinn_version(&self) -> Result<String> {
        let resp = self.call(&request(Opcode::SqinnVersion, 0)).await?;
        let (version, _) = decode_string(&resp)?;
        Ok(version)
    }

    /// Version of the wire protocol spoken by sqinn.
    pub async fn io_version(&self) -> Result<u8> {
        let resp = self.call(&request(Opcode::IoVersion, 0)).await?;
        let (version, _) = decode_byte(&resp)?;
        Ok(version)
    }

    /// Version of the SQLite library sqinn was built with.
    pub async fn sqlite_version(&self) -> Result<String> {
        let resp = self.call(&request(Opcode::SqliteVersion, 0)).await?;
        let (version, _) = decode_string(&resp)?;
        Ok(version)
    }

    /// Open a database.
    ///
    /// `filename` is either `":memory:"` or a filesystem path. The database
    /// stays open until `close`; every `open` should be paired with one.
    pub async fn open(&self, filename: &str) -> Result<()> {
        debug!("open {}", filename);
        self.call(&string_request(Opcode::Open, filename)).await?;
        Ok(())
    }

    /// Prepare a statement.
    ///
    /// sqinn holds at most one prepared statement; preparing another before
    /// `finalize` fails with a remote error. Most callers want `exec` or
    /// `query`, or `prepare_statement` for a lock-holding session.
    pub async fn prepare(&self, sql: &str) -> Result<()> {
        self.call(&string_request(Opcode::Prepare, sql)).await?;
        Ok(())
    }

    /// Bind `value` to parameter `iparam` of the prepared statement.
    ///
    /// `iparam` starts at 1. An index below 1 fails without contacting sqinn.
    pub async fn bind(&self, iparam: i32, value: impl Into<Value>) -> Result<()> {
        let req = bind_request(iparam, &value.into())?;
        self.call(&req).await?;
        Ok(())
    }

    /// Advance the prepared statement. Returns true while rows remain.
    pub async fn step(&self) -> Result<bool> {
        let resp = self.call(&request(Opcode::Step, 0)).await?;
        let (more, _) = decode_bool(&resp)?;
        Ok(more)
    }

    /// Reset the prepared statement so it can be bound and stepped again.
    pub async fn reset(&self) -> Result<()> {
        self.call(&request(Opcode::Reset, 0)).await?;
        Ok(())
    }

    /// Number of rows modified by the most recent statement.
    pub async fn changes(&self) -> Result<i32> {
        let resp = self.call(&request(Opcode::Changes, 0)).await?;
        let (changes, _) = decode_i32(&resp)?;
        Ok(changes)
    }

    /// Read column `icol` (starting at 0) of the current row as `col_type`.
    ///
    /// A NULL column yields `Value::Null` whatever `col_type` says.
    pub async fn column(&self, icol: i32, col_type: ValueType) -> Result<Value> {
        let resp = self.call(&column_request(icol, col_type)).await?;
        let (value, _) = Value::decode(&resp, col_type)?;
        Ok(value)
    }

    /// Finalize the prepared statement.
    ///
    /// Required after every `prepare`, even when `step` ran to completion.
    pub async fn finalize(&self) -> Result<()> {
        self.call(&request(Opcode::Finalize, 0)).await?;
        Ok(())
    }

    /// Close the database opened with `open`.
    pub async fn close(&self) -> Result<()> {
        debug!("close");
        self.call(&request(Opcode::Close, 0)).await?;
        Ok(())
    }

    /// Shut sqinn down and wait for it to exit.
    ///
    /// Sends the zero-length shutdown frame, closes the pipes and waits for
    /// the process and its stderr drain to finish. No response is read.
    /// Every later call on this handle fails with an I/O error.
    pub async fn terminate(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let transport = session.transport.take().ok_or_else(terminated)?;
        transport.shutdown().await?;
        if let Some((child, drain)) = session.process.take() {
            process::wait(child, drain).await?;
        }
        debug!("sqinn terminated");
        Ok(())
    }
}
