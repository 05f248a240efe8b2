//! Primitive encoding for the sqinn wire protocol.
//!
//! # Wire Format
//!
//! ```text
//! int32   4 bytes, big-endian
//! int64   8 bytes, big-endian
//! double  8 bytes, IEEE-754 bits, big-endian
//! bool    1 byte, 0 = false, anything else = true
//! string  int32 length + UTF-8 bytes, no terminator
//! blob    int32 length + raw bytes
//! ```
//!
//! Encoders append to a request buffer. Decoders return the value together
//! with the unconsumed rest of the buffer so that callers can chain them
//! positionally.

use crate::error::{Result, SqinnError};

pub fn encode_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn encode_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn encode_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_bits().to_be_bytes());
}

pub fn encode_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

/// Encode a length-prefixed UTF-8 string.
///
/// Lengths beyond `i32::MAX` cannot occur in a valid request; the transport
/// rejects oversized payloads before writing.
pub fn encode_str(buf: &mut Vec<u8>, v: &str) {
    encode_blob(buf, v.as_bytes());
}

/// Encode a length-prefixed byte blob.
pub fn encode_blob(buf: &mut Vec<u8>, v: &[u8]) {
    encode_i32(buf, v.len() as i32);
    buf.extend_from_slice(v);
}

/// Split `n` bytes off the front of `buf`.
fn take(buf: &[u8], n: usize) -> Result<(&[u8], &[u8])> {
    if buf.len() < n {
        return Err(SqinnError::Truncated {
            needed: n,
            available: buf.len(),
        });
    }
    Ok(buf.split_at(n))
}

fn take_array<const N: usize>(buf: &[u8]) -> Result<([u8; N], &[u8])> {
    let (head, rest) = take(buf, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

pub fn decode_byte(buf: &[u8]) -> Result<(u8, &[u8])> {
    let ([b], rest) = take_array::<1>(buf)?;
    Ok((b, rest))
}

pub fn decode_i32(buf: &[u8]) -> Result<(i32, &[u8])> {
    let (bytes, rest) = take_array::<4>(buf)?;
    Ok((i32::from_be_bytes(bytes), rest))
}

pub fn decode_i64(buf: &[u8]) -> Result<(i64, &[u8])> {
    let (bytes, rest) = take_array::<8>(buf)?;
    Ok((i64::from_be_bytes(bytes), rest))
}

pub fn decode_f64(buf: &[u8]) -> Result<(f64, &[u8])> {
    let (bytes, rest) = take_array::<8>(buf)?;
    Ok((f64::from_bits(u64::from_be_bytes(bytes)), rest))
}

pub fn decode_bool(buf: &[u8]) -> Result<(bool, &[u8])> {
    let (b, rest) = decode_byte(buf)?;
    Ok((b != 0, rest))
}

/// Decode a length-prefixed blob.
pub fn decode_blob(buf: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    let (len, rest) = decode_i32(buf)?;
    // A negative length can only come from a broken peer.
    let len = usize::try_from(len).map_err(|_| SqinnError::Truncated {
        needed: 0,
        available: rest.len(),
    })?;
    let (bytes, rest) = take(rest, len)?;
    Ok((bytes.to_vec(), rest))
}

/// Decode a length-prefixed string.
///
/// Invalid UTF-8 is replaced rather than rejected; sqinn only ever sends
/// text that SQLite handed it.
pub fn decode_string(buf: &[u8]) -> Result<(String, &[u8])> {
    let (bytes, rest) = decode_blob(buf)?;
    let s = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    Ok((s, rest))
}
