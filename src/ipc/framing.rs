//! Length-prefixed framing for the sqinn stdin/stdout protocol.
//!
//! # Wire Format
//!
//! ```text
//! request:  int32 length | opcode (1 byte) | arguments
//! response: int32 length | ok flag (1 byte) | result, or error string if !ok
//! shutdown: int32 0
//! ```
//!
//! The pipe has no request ids, so a request must be followed by exactly its
//! own response before the next request is written. `Transport` does one
//! exchange per call; serializing callers is the job of the lock around it.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{decode_bool, decode_i32, decode_string, encode_i32};
use crate::error::{Result, SqinnError};

/// Largest payload that fits the signed 32-bit length prefix.
const MAX_FRAME_SIZE: usize = i32::MAX as usize;

/// Write one frame: length prefix followed by the payload.
///
/// Header and payload go out in a single write, then the stream is flushed.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(SqinnError::RequestTooLarge(payload.len()));
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    encode_i32(&mut buf, payload.len() as i32);
    buf.extend_from_slice(payload);

    writer
        .write_all(&buf)
        .await
        .map_err(|e| SqinnError::io("writing to", e))?;
    writer
        .flush()
        .await
        .map_err(|e| SqinnError::io("writing to", e))
}

/// Read one frame and return its payload.
///
/// # Errors
///
/// - `InvalidResponseSize` if the length prefix is zero or negative
/// - `Io` if the stream fails or closes before the full frame arrived
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| SqinnError::io("reading from", e))?;

    let (size, _) = decode_i32(&header)?;
    if size <= 0 {
        return Err(SqinnError::InvalidResponseSize(size));
    }

    let mut body = vec![0u8; size as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| SqinnError::io("reading from", e))?;
    Ok(body)
}

/// Split the status flag off a response payload.
///
/// Returns the remaining bytes on success, or the remote error message.
pub fn unwrap_response(mut payload: Vec<u8>) -> Result<Vec<u8>> {
    let (ok, rest) = decode_bool(&payload)?;
    if !ok {
        let (msg, _) = decode_string(rest)?;
        return Err(SqinnError::Remote(msg));
    }
    payload.drain(..1);
    Ok(payload)
}

/// One end of a sqinn conversation: the child's stdin and stdout.
#[derive(Debug)]
pub struct Transport<W, R> {
    writer: W,
    reader: R,
}

impl<W, R> Transport<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    pub fn new(writer: W, reader: R) -> Self {
        Self { writer, reader }
    }

    /// Send a request payload and return the response payload after the ok
    /// flag.
    ///
    /// The payload is not interpreted beyond the status flag; decoding the
    /// opcode-specific result is up to the caller.
    pub async fn write_and_read(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        write_frame(&mut self.writer, request).await?;
        let response = read_frame(&mut self.reader).await?;
        unwrap_response(response)
    }

    /// Send the zero-length shutdown frame and close the write side.
    ///
    /// sqinn answers this by exiting; no response frame is read.
    pub async fn shutdown(mut self) -> Result<()> {
        write_frame(&mut self.writer, &[]).await?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| SqinnError::io("closing", e))
    }
}
