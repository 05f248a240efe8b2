//! In-process sqinn peer for integration tests.
//!
//! Speaks the sqinn wire protocol over a `tokio::io::duplex` pipe and runs
//! the requests against SQLite through rusqlite, mimicking the sqinn
//! executable closely enough to exercise the whole client end to end:
//! one prepared statement at a time, remote errors for misuse, zero-length
//! frame to shut down.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use tokio::io::{duplex, split, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use sqinn_client::codec::{
    decode_blob, decode_byte, decode_f64, decode_i32, decode_i64, decode_string, encode_blob,
    encode_bool, encode_f64, encode_i32, encode_i64, encode_str,
};
use sqinn_client::{Opcode, Sqinn, ValueType};

pub const FAKE_SQINN_VERSION: &str = "1.1.27-test";
pub const IO_VERSION: u8 = 1;

/// What the peer saw on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Request(Opcode),
    Shutdown,
}

/// A running peer: the client handle plus the peer's event log.
pub struct Peer {
    pub sq: Sqinn,
    events: Arc<Mutex<Vec<Event>>>,
    task: JoinHandle<()>,
}

impl Peer {
    pub fn start() -> Self {
        let (client, server) = duplex(64 * 1024);
        let (client_read, client_write) = split(client);
        let events = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(server, Arc::clone(&events)));
        Self {
            sq: Sqinn::from_streams(client_write, client_read),
            events,
            task,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Request(_)))
            .count()
    }

    /// Wait for the peer loop to end (after shutdown or a closed pipe).
    pub async fn join(self) -> Vec<Event> {
        let Peer { sq, events, task } = self;
        drop(sq);
        task.await.expect("peer task panicked");
        let events = events.lock().unwrap().clone();
        events
    }
}

async fn serve(stream: tokio::io::DuplexStream, events: Arc<Mutex<Vec<Event>>>) {
    let (mut reader, mut writer) = split(stream);
    let mut db = FakeDb::default();

    loop {
        let mut header = [0u8; 4];
        if reader.read_exact(&mut header).await.is_err() {
            return;
        }
        let size = i32::from_be_bytes(header);
        if size == 0 {
            events.lock().unwrap().push(Event::Shutdown);
            return;
        }
        let mut payload = vec![0u8; size as usize];
        if reader.read_exact(&mut payload).await.is_err() {
            return;
        }

        let mut resp = Vec::new();
        match db.handle(&payload, &events) {
            Ok(body) => {
                encode_bool(&mut resp, true);
                resp.extend_from_slice(&body);
            }
            Err(msg) => {
                encode_bool(&mut resp, false);
                encode_str(&mut resp, &msg);
            }
        }
        let mut frame = Vec::new();
        encode_i32(&mut frame, resp.len() as i32);
        frame.extend_from_slice(&resp);
        if writer.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn msg<E: Display>(e: E) -> String {
    e.to_string()
}

/// The single prepared statement.
#[derive(Default)]
struct Prepared {
    sql: String,
    params: BTreeMap<usize, SqlValue>,
    /// Rows still to be stepped through; `None` until the first step.
    pending: Option<VecDeque<Vec<SqlValue>>>,
    current: Option<Vec<SqlValue>>,
}

#[derive(Default)]
struct FakeDb {
    conn: Option<Connection>,
    stmt: Option<Prepared>,
    last_changes: i32,
}

impl FakeDb {
    fn conn(&self) -> Result<&Connection, String> {
        self.conn.as_ref().ok_or_else(|| "no database open".to_string())
    }

    fn handle(&mut self, payload: &[u8], events: &Mutex<Vec<Event>>) -> Result<Vec<u8>, String> {
        let (code, args) = decode_byte(payload).map_err(msg)?;
        let op = Opcode::from_byte(code).ok_or_else(|| format!("invalid function code {}", code))?;
        events.lock().unwrap().push(Event::Request(op));

        let mut out = Vec::new();
        match op {
            Opcode::SqinnVersion => encode_str(&mut out, FAKE_SQINN_VERSION),
            Opcode::IoVersion => out.push(IO_VERSION),
            Opcode::SqliteVersion => encode_str(&mut out, rusqlite::version()),
            Opcode::Open => {
                let (filename, _) = decode_string(args).map_err(msg)?;
                self.conn = Some(Connection::open(&filename).map_err(msg)?);
            }
            Opcode::Prepare => {
                let (sql, _) = decode_string(args).map_err(msg)?;
                if self.stmt.is_some() {
                    return Err("prep: stmt already prepared".to_string());
                }
                self.conn()?.prepare(&sql).map_err(msg)?;
                self.stmt = Some(Prepared {
                    sql,
                    ..Prepared::default()
                });
            }
            Opcode::Bind => {
                let (iparam, rest) = decode_i32(args).map_err(msg)?;
                let (value, _) = decode_bind_value(rest)?;
                let stmt = self.stmt.as_mut().ok_or("bind: no stmt prepared")?;
                stmt.params.insert(iparam as usize, value);
            }
            Opcode::Step => {
                let more = self.step()?;
                encode_bool(&mut out, more);
            }
            Opcode::Reset => {
                let stmt = self.stmt.as_mut().ok_or("reset: no stmt prepared")?;
                stmt.pending = None;
                stmt.current = None;
            }
            Opcode::Changes => encode_i32(&mut out, self.last_changes),
            Opcode::Column => {
                let (icol, rest) = decode_i32(args).map_err(msg)?;
                let (col_type, _) = decode_byte(rest).map_err(msg)?;
                let col_type = ValueType::from_byte(col_type)
                    .ok_or_else(|| format!("invalid col type {}", col_type))?;
                let stmt = self.stmt.as_ref().ok_or("column: no stmt prepared")?;
                let row = stmt.current.as_ref().ok_or("column: no current row")?;
                let value = row
                    .get(icol as usize)
                    .ok_or_else(|| format!("column: index {} out of range", icol))?;
                encode_column(&mut out, value, col_type);
            }
            Opcode::Finalize => {
                self.stmt = None;
            }
            Opcode::Close => {
                self.stmt = None;
                self.conn = None;
            }
            Opcode::Exec => out = self.exec(args)?,
            Opcode::Query => out = self.query(args)?,
        }
        Ok(out)
    }

    fn step(&mut self) -> Result<bool, String> {
        let conn = self.conn.as_ref().ok_or("step: no database open")?;
        let stmt = self.stmt.as_mut().ok_or("step: no stmt prepared")?;
        if stmt.pending.is_none() {
            let mut prepared = conn.prepare(&stmt.sql).map_err(msg)?;
            for (idx, value) in &stmt.params {
                prepared.raw_bind_parameter(*idx, value).map_err(msg)?;
            }
            let ncols = prepared.column_count();
            let mut pending = VecDeque::new();
            if ncols == 0 {
                self.last_changes = prepared.raw_execute().map_err(msg)? as i32;
            } else {
                let mut rows = prepared.raw_query();
                while let Some(row) = rows.next().map_err(msg)? {
                    let values = (0..ncols)
                        .map(|i| row.get::<_, SqlValue>(i))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(msg)?;
                    pending.push_back(values);
                }
            }
            stmt.pending = Some(pending);
        }
        stmt.current = stmt.pending.as_mut().and_then(VecDeque::pop_front);
        Ok(stmt.current.is_some())
    }

    fn exec(&mut self, args: &[u8]) -> Result<Vec<u8>, String> {
        let (sql, rest) = decode_string(args).map_err(msg)?;
        let (niterations, rest) = decode_i32(rest).map_err(msg)?;
        let (nparams, mut rest) = decode_i32(rest).map_err(msg)?;
        if self.stmt.is_some() {
            return Err("exec: stmt already prepared".to_string());
        }

        let conn = self.conn.as_ref().ok_or("exec: no database open")?;
        let mut prepared = conn.prepare(&sql).map_err(msg)?;
        let mut out = Vec::new();
        for _ in 0..niterations {
            for iparam in 1..=nparams {
                let (value, tail) = decode_bind_value(rest)?;
                prepared
                    .raw_bind_parameter(iparam as usize, value)
                    .map_err(msg)?;
                rest = tail;
            }
            let changes = prepared.raw_execute().map_err(msg)? as i32;
            self.last_changes = changes;
            encode_i32(&mut out, changes);
        }
        Ok(out)
    }

    fn query(&mut self, args: &[u8]) -> Result<Vec<u8>, String> {
        let (sql, rest) = decode_string(args).map_err(msg)?;
        let (nparams, mut rest) = decode_i32(rest).map_err(msg)?;
        if self.stmt.is_some() {
            return Err("query: stmt already prepared".to_string());
        }

        let conn = self.conn.as_ref().ok_or("query: no database open")?;
        let mut prepared = conn.prepare(&sql).map_err(msg)?;
        for iparam in 1..=nparams {
            let (value, tail) = decode_bind_value(rest)?;
            prepared
                .raw_bind_parameter(iparam as usize, value)
                .map_err(msg)?;
            rest = tail;
        }
        let (ncols, rest) = decode_i32(rest).map_err(msg)?;
        let col_types = rest
            .iter()
            .take(ncols as usize)
            .map(|b| ValueType::from_byte(*b).ok_or_else(|| format!("invalid col type {}", b)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut nrows = 0;
        let mut body = Vec::new();
        let mut rows = prepared.raw_query();
        while let Some(row) = rows.next().map_err(msg)? {
            for (icol, col_type) in col_types.iter().enumerate() {
                let value: SqlValue = row.get(icol).map_err(msg)?;
                encode_column(&mut body, &value, *col_type);
            }
            nrows += 1;
        }

        let mut out = Vec::new();
        encode_i32(&mut out, nrows);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

fn decode_bind_value(buf: &[u8]) -> Result<(SqlValue, &[u8]), String> {
    let (tag, rest) = decode_byte(buf).map_err(msg)?;
    let tag = ValueType::from_byte(tag).ok_or_else(|| format!("invalid bind type {}", tag))?;
    Ok(match tag {
        ValueType::Null => (SqlValue::Null, rest),
        ValueType::Int => {
            let (v, rest) = decode_i32(rest).map_err(msg)?;
            (SqlValue::Integer(i64::from(v)), rest)
        }
        ValueType::Int64 => {
            let (v, rest) = decode_i64(rest).map_err(msg)?;
            (SqlValue::Integer(v), rest)
        }
        ValueType::Double => {
            let (v, rest) = decode_f64(rest).map_err(msg)?;
            (SqlValue::Real(v), rest)
        }
        ValueType::Text => {
            let (v, rest) = decode_string(rest).map_err(msg)?;
            (SqlValue::Text(v), rest)
        }
        ValueType::Blob => {
            let (v, rest) = decode_blob(rest).map_err(msg)?;
            (SqlValue::Blob(v), rest)
        }
    })
}

/// Presence flag, then the value converted the way sqlite3_column_* would.
fn encode_column(out: &mut Vec<u8>, value: &SqlValue, col_type: ValueType) {
    if matches!(value, SqlValue::Null) {
        encode_bool(out, false);
        return;
    }
    encode_bool(out, true);

    let as_i64 = || match value {
        SqlValue::Integer(i) => *i,
        SqlValue::Real(f) => *f as i64,
        SqlValue::Text(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let as_text = || match value {
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        SqlValue::Null => String::new(),
    };

    match col_type {
        ValueType::Null => {}
        ValueType::Int => encode_i32(out, as_i64() as i32),
        ValueType::Int64 => encode_i64(out, as_i64()),
        ValueType::Double => {
            let f = match value {
                SqlValue::Real(f) => *f,
                SqlValue::Integer(i) => *i as f64,
                SqlValue::Text(s) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            };
            encode_f64(out, f);
        }
        ValueType::Text => encode_str(out, &as_text()),
        ValueType::Blob => match value {
            SqlValue::Blob(b) => encode_blob(out, b),
            _ => encode_blob(out, as_text().as_bytes()),
        },
    }
}
