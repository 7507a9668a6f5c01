//! End-to-end coverage of `Session`/`Runner` against a real sqlite driver:
//! literal-SQL CRUD, transaction commit/rollback, and the `tx`/`tx2` helpers.

#![cfg(feature = "sqlite")]

use serde::{Deserialize, Serialize};
use sqlbatis::executor::session::Session;
use sqlbatis::udbc::connection::Connection;
use sqlbatis::udbc::driver::Driver;
use sqlbatis::udbc::sqlite::pool::SqliteDriver;
use sqlbatis::udbc::value::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

static TEST_SEQ: AtomicUsize = AtomicUsize::new(0);

fn unique_id(prefix: &str) -> String {
    let seq = TEST_SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{seq}_{nanos}")
}

/// A fresh temp-file sqlite database, so connections opened across separate
/// `acquire()` calls (i.e. outside a transaction) still see the same data —
/// `sqlite::memory:` hands out a brand new empty database per `acquire()`.
async fn setup_sqlite(prefix: &str) -> (Arc<dyn Driver>, PathBuf) {
    let file_name = format!("{}.db", unique_id(prefix));
    let path = std::env::temp_dir().join(file_name);
    let url = format!("sqlite:{}", path.display());
    let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::new(url).build().unwrap());

    let mut conn = driver.acquire().await.unwrap();
    conn.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, age INTEGER NOT NULL)",
        &[],
    )
    .await
    .unwrap();

    (driver, path)
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct User {
    id: i64,
    name: String,
    age: i64,
}

#[tokio::test(flavor = "current_thread")]
async fn basic_crud_without_a_transaction() {
    let (driver, path) = setup_sqlite("basic_crud").await;
    let session = Session::new(driver);

    session
        .insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
        .param(&[Value::Str("alice".into()), Value::I64(18)])
        .result_rows(None)
        .await
        .unwrap();

    session
        .insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
        .param(&[Value::Str("bob".into()), Value::I64(20)])
        .result_rows(None)
        .await
        .unwrap();

    // `result` captures only the first row of a multi-row select.
    let mut first = User::default();
    session
        .select("SELECT id, name, age FROM users ORDER BY id")
        .param(&[])
        .result(Some(&mut first))
        .await
        .unwrap();
    assert_eq!(first.name, "alice");

    session
        .update("UPDATE users SET age = #{0} WHERE name = #{1}")
        .param(&[Value::I64(19), Value::Str("alice".into())])
        .result_rows(None)
        .await
        .unwrap();

    let mut alice = User::default();
    session
        .select("SELECT id, name, age FROM users WHERE name = #{0}")
        .param(&[Value::Str("alice".into())])
        .result(Some(&mut alice))
        .await
        .unwrap();
    assert_eq!(alice.age, 19);

    let affected = session
        .delete("DELETE FROM users WHERE name = #{0}")
        .param(&[Value::Str("bob".into())])
        .result_rows(None)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn transaction_commit_persists_and_rollback_discards() {
    let (driver, path) = setup_sqlite("tx_commit_rollback").await;
    let session = Session::new(driver);

    session.begin().await.unwrap();
    session
        .insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
        .param(&[Value::Str("carol".into()), Value::I64(30)])
        .result_rows(None)
        .await
        .unwrap();
    session.commit().await.unwrap();

    let mut carol = User::default();
    session
        .select("SELECT id, name, age FROM users WHERE name = #{0}")
        .param(&[Value::Str("carol".into())])
        .result(Some(&mut carol))
        .await
        .unwrap();
    assert_eq!(carol.name, "carol");

    session.begin().await.unwrap();
    session
        .insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
        .param(&[Value::Str("dave".into()), Value::I64(40)])
        .result_rows(None)
        .await
        .unwrap();
    session.rollback().await.unwrap();

    let mut dave = User::default();
    let outcome = session
        .select("SELECT id, name, age FROM users WHERE name = #{0}")
        .param(&[Value::Str("dave".into())])
        .result(Some(&mut dave))
        .await;
    // no matching row: `result` leaves `dest` untouched and returns Ok
    assert!(outcome.is_ok());
    assert_eq!(dave.name, "");

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn tx_swallows_the_closures_error_after_rolling_back() {
    let (driver, path) = setup_sqlite("tx_swallow").await;
    let session = Session::new(driver);

    let result = session
        .tx(|s| async move {
            s.insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
                .param(&[Value::Str("erin".into()), Value::I64(50)])
                .result_rows(None)
                .await?;
            Err(sqlbatis::DbError::DbError("boom".into()))
        })
        .await;
    assert!(result.is_ok());

    let mut erin = User::default();
    session
        .select("SELECT id, name, age FROM users WHERE name = #{0}")
        .param(&[Value::Str("erin".into())])
        .result(Some(&mut erin))
        .await
        .unwrap();
    assert_eq!(erin.name, "");

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn tx2_surfaces_the_closures_error_after_rolling_back() {
    let (driver, path) = setup_sqlite("tx2_surface").await;
    let session = Session::new(driver);

    let result = session
        .tx2(|s| async move {
            s.insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})")
                .param(&[Value::Str("frank".into()), Value::I64(60)])
                .result_rows(None)
                .await?;
            Err(sqlbatis::DbError::DbError("boom".into()))
        })
        .await;
    assert!(result.is_err());

    let mut frank = User::default();
    session
        .select("SELECT id, name, age FROM users WHERE name = #{0}")
        .param(&[Value::Str("frank".into())])
        .result(Some(&mut frank))
        .await
        .unwrap();
    assert_eq!(frank.name, "");

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn insert_runner_captures_the_generated_id() {
    let (driver, path) = setup_sqlite("last_insert_id").await;
    let session = Session::new(driver);

    let mut insert = session.insert("INSERT INTO users(name, age) VALUES (#{0}, #{1})");
    insert.param(&[Value::Str("grace".into()), Value::I64(22)]);
    insert.result_rows(None).await.unwrap();
    let id = insert.last_insert_id();
    assert!(id > 0);

    let mut grace = User::default();
    session
        .select("SELECT id, name, age FROM users WHERE id = #{0}")
        .param(&[Value::I64(id)])
        .result(Some(&mut grace))
        .await
        .unwrap();
    assert_eq!(grace.name, "grace");

    let _ = std::fs::remove_file(path);
}
