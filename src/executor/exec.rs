use crate::Result;
use crate::error::DbError;
use crate::errcode::{EXECUTOR_BEGIN_ERROR, EXECUTOR_COMMIT_ERROR, EXECUTOR_GET_CONNECTION_ERROR, EXECUTOR_QUERY_ERROR};
use crate::executor::transaction::Transaction;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc::value::{FromValue, Value};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

fn to_args(params: &[Value]) -> Vec<(String, Value)> {
    params.iter().cloned().map(|v| (String::new(), v)).collect()
}

/// Executes a rendered, already-bound statement (INSERT/UPDATE/DELETE) on a
/// connection and logs timing/row-count at debug level.
pub(crate) async fn execute_conn(
    conn: &mut dyn Connection,
    template_name: &str,
    sql: &str,
    params: &[Value],
) -> Result<u64> {
    let start = Instant::now();
    let args = to_args(params);
    let result = conn.execute(sql, &args).await;
    let elapsed = start.elapsed().as_millis();

    match &result {
        Ok(affected) => debug!(
            "execute[{}]: sql=\n{}, params={:?}, elapsed={}ms, affected={}",
            template_name, sql, params, elapsed, affected
        ),
        Err(e) => debug!(
            "execute[{}]: sql=\n{}, params={:?}, elapsed={}ms, error={:?}",
            template_name, sql, params, elapsed, e
        ),
    }

    result
}

/// Executes a rendered SELECT and returns raw rows, logging timing/row-count
/// at debug level.
pub(crate) async fn query_conn(
    conn: &mut dyn Connection,
    template_name: &str,
    sql: &str,
    params: &[Value],
) -> Result<Vec<HashMap<String, Value>>> {
    let start = Instant::now();
    let args = to_args(params);
    let result = conn.query(sql, &args).await;
    let elapsed = start.elapsed().as_millis();

    match &result {
        Ok(rows) => debug!(
            "query[{}]: sql=\n{}, params={:?}, elapsed={}ms, rows={}",
            template_name,
            sql,
            params,
            elapsed,
            rows.len()
        ),
        Err(e) => debug!(
            "query[{}]: sql=\n{}, params={:?}, elapsed={}ms, error={:?}",
            template_name, sql, params, elapsed, e
        ),
    }

    result
}

/// Maps raw database rows to the target type `R`.
pub(crate) fn map_rows<R: FromValue>(rows: Vec<HashMap<String, Value>>) -> Result<Vec<R>> {
    rows.into_iter()
        .map(|r| {
            R::from_value(Value::Map(r))
                .map_err(|e| DbError::SerializationError(format!("row mapping failed: {:?}", e)))
        })
        .collect()
}

/// Wraps one transaction with its own closed flag (ported from
/// `SimpleExecutor` in the original Go source) — `closed` tracks whether the
/// executor itself has been shut down by its owner, independent of whether
/// the transaction it wraps reached `Closed` normally via commit/rollback.
pub(crate) struct SimpleExecutor {
    transaction: Transaction,
    closed: bool,
}

impl SimpleExecutor {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transaction_connection_mut(&mut self) -> Option<&mut dyn Connection> {
        if self.closed {
            return None;
        }
        self.transaction.connection_mut()
    }

    /// Optionally rolls back, then always marks the executor closed and
    /// releases its transaction.
    pub async fn close(&mut self, rollback: bool) {
        if rollback {
            let _ = self.rollback(true).await;
        }
        self.closed = true;
        self.transaction = Transaction::idle();
    }

    pub async fn query(
        &mut self,
        template_name: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<HashMap<String, Value>>> {
        if self.closed {
            return Err(DbError::Coded(&EXECUTOR_QUERY_ERROR));
        }
        let conn = self
            .transaction
            .connection_mut()
            .ok_or(DbError::Coded(&EXECUTOR_GET_CONNECTION_ERROR))?;
        query_conn(conn, template_name, sql, params).await
    }

    pub async fn exec(&mut self, template_name: &str, sql: &str, params: &[Value]) -> Result<u64> {
        if self.closed {
            return Err(DbError::Coded(&EXECUTOR_QUERY_ERROR));
        }
        let conn = self
            .transaction
            .connection_mut()
            .ok_or(DbError::Coded(&EXECUTOR_GET_CONNECTION_ERROR))?;
        execute_conn(conn, template_name, sql, params).await
    }

    pub async fn begin(&mut self, pool: &Arc<dyn Driver>) -> Result<()> {
        if self.closed {
            return Err(DbError::Coded(&EXECUTOR_BEGIN_ERROR));
        }
        self.transaction = Transaction::begin(pool).await?;
        Ok(())
    }

    pub async fn commit(&mut self, require: bool) -> Result<()> {
        if self.closed {
            return Err(DbError::Coded(&EXECUTOR_COMMIT_ERROR));
        }
        if require {
            self.transaction.commit().await
        } else {
            Ok(())
        }
    }

    pub async fn rollback(&mut self, require: bool) -> Result<()> {
        if !self.closed && require {
            return self.transaction.rollback().await;
        }
        Ok(())
    }
}
