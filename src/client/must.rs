//! Panicking variants of the bulk operations.
//!
//! For call sites that treat any sqinn failure as fatal, e.g. test setup or
//! throwaway tools. Each one only turns the error of its counterpart into a
//! panic.

use super::Sqinn;
use crate::value::{Row, Value, ValueType};

impl Sqinn {
    /// Like `exec`, but panics on error.
    pub async fn must_exec(
        &self,
        sql: &str,
        niterations: i32,
        nparams: i32,
        values: &[Value],
    ) -> Vec<i32> {
        self.exec(sql, niterations, nparams, values)
            .await
            .unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like `exec_one`, but panics on error.
    pub async fn must_exec_one(&self, sql: &str) -> i32 {
        self.exec_one(sql).await.unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like `query`, but panics on error.
    pub async fn must_query(
        &self,
        sql: &str,
        values: &[Value],
        col_types: &[ValueType],
    ) -> Vec<Row> {
        self.query(sql, values, col_types)
            .await
            .unwrap_or_else(|e| panic!("{}", e))
    }
}
