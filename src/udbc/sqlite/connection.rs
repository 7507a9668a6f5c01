use async_trait::async_trait;
use rusqlite::params_from_iter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::udbc::connection::Connection;
use crate::udbc::sqlite::value_codec::{from_sqlite_value, to_sqlite_value};
use crate::udbc::value::Value;

fn sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::DbError(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> DbError {
    DbError::DbError(e.to_string())
}

pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteConnection {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(
        &mut self,
        sql: &str,
        args: &[(String, Value)],
    ) -> Result<Vec<HashMap<String, Value>>, DbError> {
        let sql = sql.to_string();
        let params = args
            .iter()
            .map(|(_, v)| to_sqlite_value(v))
            .collect::<Vec<_>>();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(sqlite_err)?;
            let column_count = stmt.column_count();
            let column_names = (0..column_count)
                .map(|i| {
                    stmt.column_name(i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| i.to_string())
                })
                .collect::<Vec<_>>();

            let mut rows = stmt.query(params_from_iter(params)).map_err(sqlite_err)?;
            let mut out = Vec::new();

            while let Some(row) = rows.next().map_err(sqlite_err)? {
                let mut map = HashMap::with_capacity(column_count);
                for (i, name) in column_names.iter().enumerate() {
                    let v = row.get_ref(i).map_err(sqlite_err)?;
                    map.insert(name.clone(), from_sqlite_value(v));
                }
                out.push(map);
            }

            Ok::<_, DbError>(out)
        })
        .await
        .map_err(join_err)?
    }

    async fn execute(&mut self, sql: &str, args: &[(String, Value)]) -> Result<u64, DbError> {
        let sql = sql.to_string();
        let params = args
            .iter()
            .map(|(_, v)| to_sqlite_value(v))
            .collect::<Vec<_>>();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let affected = conn
                .execute(&sql, params_from_iter(params))
                .map_err(sqlite_err)?;
            Ok::<_, DbError>(affected as u64)
        })
        .await
        .map_err(join_err)?
    }

    async fn last_insert_id(&mut self) -> Result<u64, DbError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            Ok::<_, DbError>(conn.last_insert_rowid().max(0) as u64)
        })
        .await
        .map_err(join_err)?
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute_batch("BEGIN").map_err(sqlite_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute_batch("COMMIT").map_err(sqlite_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute_batch("ROLLBACK").map_err(sqlite_err)
        })
        .await
        .map_err(join_err)?
    }
}
