//! Exec and Query: many statement steps in one round trip.
//!
//! sqinn runs the whole prepare/bind/step/reset/finalize cycle itself, so
//! these operations cost a single request/response exchange regardless of
//! the number of iterations or rows.

use super::{request, Opcode, Sqinn};
use crate::codec::{decode_i32, encode_i32, encode_str};
use crate::error::{Result, SqinnError};
use crate::value::{Row, Value, ValueType};

/// A slice length as the protocol's i32 count.
fn frame_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| SqinnError::RequestTooLarge(len))
}

impl Sqinn {
    /// Execute `sql` `niterations` times, binding `nparams` values each time.
    ///
    /// `values` holds all parameters, iteration by iteration, and its length
    /// must be exactly `niterations * nparams`. Returns the number of
    /// modified rows for every iteration, so the result always has
    /// `niterations` entries. With zero iterations nothing is executed.
    ///
    /// Use `query` for statements that return rows.
    ///
    /// # Errors
    ///
    /// Argument errors are reported before anything is sent. SQL errors come
    /// back as `SqinnError::Remote`.
    pub async fn exec(
        &self,
        sql: &str,
        niterations: i32,
        nparams: i32,
        values: &[Value],
    ) -> Result<Vec<i32>> {
        if niterations < 0 {
            return Err(SqinnError::InvalidIterations {
                sql: sql.to_string(),
                niterations,
            });
        }
        if nparams < 0 {
            return Err(SqinnError::InvalidParamCount {
                sql: sql.to_string(),
                nparams,
            });
        }
        let expected = i64::from(niterations) * i64::from(nparams);
        if values.len() as i64 != expected {
            return Err(SqinnError::ValueCountMismatch {
                sql: sql.to_string(),
                expected,
                actual: values.len(),
            });
        }

        let mut req = request(Opcode::Exec, 12 + sql.len() + 9 * values.len());
        encode_str(&mut req, sql);
        encode_i32(&mut req, niterations);
        encode_i32(&mut req, nparams);
        for value in values {
            value.encode(&mut req);
        }

        let resp = self.call(&req).await?;
        let mut rest = resp.as_slice();
        let mut changes = Vec::with_capacity((niterations as usize).min(rest.len() / 4));
        for _ in 0..niterations {
            let (n, tail) = decode_i32(rest)?;
            changes.push(n);
            rest = tail;
        }
        Ok(changes)
    }

    /// Execute a parameterless statement once and return its change count.
    ///
    /// Meant for DDL and transaction control:
    ///
    /// ```ignore
    /// sq.exec_one("BEGIN").await?;
    /// // ...
    /// sq.exec_one("COMMIT").await?;
    /// ```
    pub async fn exec_one(&self, sql: &str) -> Result<i32> {
        let changes = self.exec(sql, 1, 0, &[]).await?;
        Ok(changes.first().copied().unwrap_or_default())
    }

    /// Run `sql` with `values` bound and return every resulting row.
    ///
    /// `col_types` declares how to decode each column, in order; the
    /// protocol does not describe columns itself. All rows are read into
    /// memory before returning, so bound large results in SQL (`LIMIT`).
    pub async fn query(
        &self,
        sql: &str,
        values: &[Value],
        col_types: &[ValueType],
    ) -> Result<Vec<Row>> {
        let mut req = request(
            Opcode::Query,
            12 + sql.len() + 9 * values.len() + col_types.len(),
        );
        encode_str(&mut req, sql);
        encode_i32(&mut req, frame_count(values.len())?);
        for value in values {
            value.encode(&mut req);
        }
        encode_i32(&mut req, frame_count(col_types.len())?);
        req.extend(col_types.iter().map(|t| t.as_byte()));

        let resp = self.call(&req).await?;
        let (nrows, mut rest) = decode_i32(&resp)?;
        // nrows comes from the peer; only trust it as far as the payload goes
        let mut rows = Vec::with_capacity((nrows.max(0) as usize).min(rest.len()));
        for _ in 0..nrows {
            let mut values = Vec::with_capacity(col_types.len());
            for col_type in col_types {
                let (value, tail) = Value::decode(rest, *col_type)?;
                values.push(value);
                rest = tail;
            }
            rows.push(Row::new(values));
        }
        Ok(rows)
    }
}
