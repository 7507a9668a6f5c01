use crate::Result;
use crate::error::DbError;
use crate::errcode::TRANSACTION_WITHOUT_BEGIN;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use std::sync::Arc;

/// A transaction's lifecycle, made explicit (teacher folds `Idle` and "no
/// transaction yet" together via `Option<Connection>`; this keeps the three
/// states directly checkable rather than inferred).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionState {
    Idle,
    Begun,
    Closed,
}

/// One physical connection checked out for the lifetime of a transaction.
pub(crate) struct Transaction {
    conn: Option<Box<dyn Connection>>,
    state: TransactionState,
}

impl Transaction {
    pub fn idle() -> Self {
        Self {
            conn: None,
            state: TransactionState::Idle,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub async fn begin(pool: &Arc<dyn Driver>) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        conn.begin().await?;
        Ok(Self {
            conn: Some(conn),
            state: TransactionState::Begun,
        })
    }

    pub async fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Begun {
            return Err(DbError::Coded(&TRANSACTION_WITHOUT_BEGIN));
        }
        if let Some(conn) = self.conn.as_mut() {
            conn.commit().await?;
        }
        self.state = TransactionState::Closed;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Begun {
            return Err(DbError::Coded(&TRANSACTION_WITHOUT_BEGIN));
        }
        let result = if let Some(conn) = self.conn.as_mut() {
            conn.rollback().await
        } else {
            Ok(())
        };
        self.state = TransactionState::Closed;
        result
    }

    pub fn connection_mut(&mut self) -> Option<&mut dyn Connection> {
        if self.state != TransactionState::Begun {
            return None;
        }
        self.conn.as_deref_mut()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Begun
            && let Some(mut conn) = self.conn.take()
        {
            tokio::spawn(async move {
                let _ = conn.rollback().await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_transaction_has_no_connection() {
        let mut t = Transaction::idle();
        assert_eq!(t.state(), TransactionState::Idle);
        assert!(t.connection_mut().is_none());
    }
}
