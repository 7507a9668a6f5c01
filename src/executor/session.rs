use crate::Result;
use crate::errcode::TRANSACTION_WITHOUT_BEGIN;
use crate::error::DbError;
use crate::executor::exec::{self, SimpleExecutor};
use crate::executor::transaction::Transaction;
use crate::registry::REGISTRY;
use crate::runner::Runner;
use crate::udbc::driver::Driver;
use crate::udbc::value::Value;
use futures_util::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;

type ExecutorMap = HashMap<String, Arc<Mutex<SimpleExecutor>>>;

thread_local! {
    static TX_CONTEXT: RefCell<ExecutorMap> = RefCell::new(HashMap::new());
}

/// Looks up the calling thread's active executor for `pool`, if any.
fn active_executor(pool: &Arc<dyn Driver>) -> Option<Arc<Mutex<SimpleExecutor>>> {
    let key = pool.name().to_string();
    TX_CONTEXT.with(|tx| tx.borrow().get(&key).cloned())
}

/// Runs `template_name`/`sql`/`params` through the calling thread's active
/// transaction if one is open for `pool`, otherwise on a fresh one-shot
/// connection. Shared by `Runner::result_rows`.
pub(crate) async fn dispatch_execute(
    pool: &Arc<dyn Driver>,
    template_name: &str,
    sql: &str,
    params: &[Value],
) -> Result<u64> {
    if let Some(executor) = active_executor(pool) {
        let mut executor = executor.lock().await;
        return executor.exec(template_name, sql, params).await;
    }
    let mut conn = pool.acquire().await?;
    exec::execute_conn(conn.as_mut(), template_name, sql, params).await
}

/// Query counterpart of [`dispatch_execute`]. Shared by `Runner::result`.
pub(crate) async fn dispatch_query(
    pool: &Arc<dyn Driver>,
    template_name: &str,
    sql: &str,
    params: &[Value],
) -> Result<Vec<HashMap<String, Value>>> {
    if let Some(executor) = active_executor(pool) {
        let mut executor = executor.lock().await;
        return executor.query(template_name, sql, params).await;
    }
    let mut conn = pool.acquire().await?;
    exec::query_conn(conn.as_mut(), template_name, sql, params).await
}

/// Reads back the last auto-generated id, preferring the active
/// transaction's connection when one is open for `pool`.
pub(crate) async fn dispatch_last_insert_id(pool: &Arc<dyn Driver>) -> Result<i64> {
    if let Some(executor) = active_executor(pool) {
        let mut executor = executor.lock().await;
        if let Some(conn) = executor.transaction_connection_mut() {
            return Ok(conn.last_insert_id().await? as i64);
        }
        return Err(DbError::DbError("transaction connection closed".to_string()));
    }
    let mut conn = pool.acquire().await?;
    Ok(conn.last_insert_id().await? as i64)
}

/// A database session: the entry point for running select/insert/update/
/// delete statements by sql-id or literal SQL, and for driving transaction
/// boundaries. Transaction state is kept in a thread-local map keyed by
/// driver name (teacher: `executor/session.rs`'s `TX_CONTEXT`), so nested
/// calls within the same thread see the same open transaction.
pub struct Session {
    pool: Arc<dyn Driver>,
}

impl Session {
    pub fn new(pool: Arc<dyn Driver>) -> Self {
        Self { pool }
    }

    pub fn select(&self, sql_or_id: &str) -> Runner {
        let template = REGISTRY.resolve_or_literal(sql_or_id, self.pool.r#type());
        Runner::new_select(self.pool.clone(), sql_or_id.to_string(), template)
    }

    pub fn insert(&self, sql_or_id: &str) -> Runner {
        let template = REGISTRY.resolve_or_literal(sql_or_id, self.pool.r#type());
        Runner::new_insert(self.pool.clone(), sql_or_id.to_string(), template)
    }

    pub fn update(&self, sql_or_id: &str) -> Runner {
        let template = REGISTRY.resolve_or_literal(sql_or_id, self.pool.r#type());
        Runner::new_update(self.pool.clone(), sql_or_id.to_string(), template)
    }

    pub fn delete(&self, sql_or_id: &str) -> Runner {
        let template = REGISTRY.resolve_or_literal(sql_or_id, self.pool.r#type());
        Runner::new_delete(self.pool.clone(), sql_or_id.to_string(), template)
    }

    /// Begins a transaction for this session's driver on the current
    /// thread. Errors if one is already open.
    pub async fn begin(&self) -> Result<()> {
        let key = self.pool.name().to_string();
        let existed = TX_CONTEXT.with(|tx| tx.borrow().contains_key(&key));
        if existed {
            return Err(DbError::DbError(format!(
                "transaction already started for '{}'",
                key
            )));
        }

        let transaction = Transaction::begin(&self.pool).await?;
        let executor = SimpleExecutor::new(transaction);
        TX_CONTEXT.with(|tx| {
            tx.borrow_mut().insert(key, Arc::new(Mutex::new(executor)));
        });
        Ok(())
    }

    /// Commits the current thread's open transaction. Errors with
    /// `TRANSACTION_WITHOUT_BEGIN` if none is open — commit from Idle fails,
    /// per the data model's invariant.
    pub async fn commit(&self) -> Result<()> {
        let key = self.pool.name().to_string();
        let Some(executor) = TX_CONTEXT.with(|tx| tx.borrow_mut().remove(&key)) else {
            return Err(DbError::Coded(&TRANSACTION_WITHOUT_BEGIN));
        };
        let mut executor = executor.lock().await;
        let result = executor.commit(true).await;
        executor.close(false).await;
        result
    }

    /// Rolls back the current thread's open transaction. Errors with
    /// `TRANSACTION_WITHOUT_BEGIN` if none is open — rollback from Idle
    /// fails, per the data model's invariant.
    pub async fn rollback(&self) -> Result<()> {
        let key = self.pool.name().to_string();
        let Some(executor) = TX_CONTEXT.with(|tx| tx.borrow_mut().remove(&key)) else {
            return Err(DbError::Coded(&TRANSACTION_WITHOUT_BEGIN));
        };
        let mut executor = executor.lock().await;
        let result = executor.rollback(true).await;
        executor.close(false).await;
        result
    }

    /// Runs `f` inside a transaction: commits if `f` succeeds, rolls back
    /// if it returns an error. Mirrors the original `Session.Tx` — the
    /// closure's own error is swallowed after triggering the rollback (the
    /// original source returns nothing from `Tx`; this is preserved as
    /// documented behavior, not an oversight). Infra failures from
    /// `begin`/`commit`/`rollback` still propagate. A panic inside `f` is
    /// caught, triggers the same rollback, and is then resumed so it still
    /// surfaces to the caller. See `tx2` for a variant that also surfaces
    /// the closure's error.
    pub async fn tx<F, Fut>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Session) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.begin().await?;
        match AssertUnwindSafe(f(self)).catch_unwind().await {
            Ok(Err(_)) => self.rollback().await?,
            Ok(Ok(())) => self.commit().await?,
            Err(payload) => {
                let _ = self.rollback().await;
                std::panic::resume_unwind(payload);
            }
        }
        Ok(())
    }

    /// Like [`Session::tx`], but propagates the closure's own error instead
    /// of swallowing it after rollback. A panic inside `f` is caught,
    /// triggers the same rollback, and is then resumed.
    pub async fn tx2<F, Fut>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Session) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.begin().await?;
        match AssertUnwindSafe(f(self)).catch_unwind().await {
            Ok(Ok(())) => self.commit().await,
            Ok(Err(e)) => {
                self.rollback().await?;
                Err(e)
            }
            Err(payload) => {
                let _ = self.rollback().await;
                std::panic::resume_unwind(payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udbc::sqlite::pool::SqliteDriver;

    #[tokio::test(flavor = "current_thread")]
    async fn commit_and_rollback_without_begin_error() {
        let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::new("sqlite::memory:").build().unwrap());
        let session = Session::new(driver);
        let err = session.commit().await.unwrap_err();
        assert_eq!(err.code().map(|c| c.code), Some(TRANSACTION_WITHOUT_BEGIN.code));
        let err = session.rollback().await.unwrap_err();
        assert_eq!(err.code().map(|c| c.code), Some(TRANSACTION_WITHOUT_BEGIN.code));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn begin_twice_on_the_same_thread_errors() {
        let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::new("sqlite::memory:").build().unwrap());
        let session = Session::new(driver);
        session.begin().await.unwrap();
        assert!(session.begin().await.is_err());
        session.rollback().await.unwrap();
    }
}
