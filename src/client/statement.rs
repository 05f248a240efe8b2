//! A prepared statement that owns the protocol lock.

use tokio::sync::MutexGuard;
use tracing::warn;

use super::{bind_request, column_request, request, string_request, Opcode, Session, Sqinn};
use crate::codec::{decode_bool, decode_i32};
use crate::error::{Result, SqinnError};
use crate::value::{Row, Value, ValueType};

/// The one prepared statement sqinn allows, held exclusively.
///
/// Obtained from `Sqinn::prepare_statement`. While it lives no other caller
/// can use the handle, so nothing can prepare a second statement or slip a
/// request in between a `step` and its `column` reads. Release it with
/// `finalize`.
///
/// Dropping a `Statement` without finalizing releases the lock but leaves
/// the statement active in sqinn; the next `prepare` will then fail.
pub struct Statement<'a> {
    session: MutexGuard<'a, Session>,
    finalized: bool,
}

impl Sqinn {
    /// Prepare `sql` and hold the handle until the statement is finalized.
    pub async fn prepare_statement(&self, sql: &str) -> Result<Statement<'_>> {
        let mut session = self.session.lock().await;
        session.call(&string_request(Opcode::Prepare, sql)).await?;
        Ok(Statement {
            session,
            finalized: false,
        })
    }
}

impl Statement<'_> {
    /// Bind `value` to parameter `iparam`, starting at 1.
    pub async fn bind(&mut self, iparam: i32, value: impl Into<Value>) -> Result<()> {
        let req = bind_request(iparam, &value.into())?;
        self.session.call(&req).await?;
        Ok(())
    }

    /// Bind `values` to parameters 1..=n in order.
    pub async fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            let iparam =
                i32::try_from(i + 1).map_err(|_| SqinnError::InvalidParamIndex(i32::MAX))?;
            let req = bind_request(iparam, value)?;
            self.session.call(&req).await?;
        }
        Ok(())
    }

    /// Advance to the next row. Returns true while rows remain.
    pub async fn step(&mut self) -> Result<bool> {
        let resp = self.session.call(&request(Opcode::Step, 0)).await?;
        let (more, _) = decode_bool(&resp)?;
        Ok(more)
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.session.call(&request(Opcode::Reset, 0)).await?;
        Ok(())
    }

    pub async fn changes(&mut self) -> Result<i32> {
        let resp = self.session.call(&request(Opcode::Changes, 0)).await?;
        let (changes, _) = decode_i32(&resp)?;
        Ok(changes)
    }

    /// Read column `icol` (starting at 0) of the current row.
    pub async fn column(&mut self, icol: i32, col_type: ValueType) -> Result<Value> {
        let resp = self.session.call(&column_request(icol, col_type)).await?;
        let (value, _) = Value::decode(&resp, col_type)?;
        Ok(value)
    }

    /// Step through all remaining rows, reading `col_types` from each.
    ///
    /// Costs one round trip per row and column; `Sqinn::query` fetches the
    /// same rows in a single exchange.
    pub async fn rows(&mut self, col_types: &[ValueType]) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while self.step().await? {
            let mut values = Vec::with_capacity(col_types.len());
            for (icol, col_type) in col_types.iter().enumerate() {
                values.push(self.column(icol as i32, *col_type).await?);
            }
            rows.push(Row::new(values));
        }
        Ok(rows)
    }

    /// Finalize the statement and release the handle.
    pub async fn finalize(mut self) -> Result<()> {
        self.finalized = true;
        self.session.call(&request(Opcode::Finalize, 0)).await?;
        Ok(())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("sqinn statement dropped without finalize");
        }
    }
}
