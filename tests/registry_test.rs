//! End-to-end coverage of XML mapper loading through `SqlRegistry` and the
//! driver-specific variant resolution a `Session` relies on when a caller
//! passes a `"namespace.id"` instead of literal SQL.

#![cfg(feature = "sqlite")]

use sqlbatis::executor::session::Session;
use sqlbatis::registry::REGISTRY;
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

async fn setup_sqlite(prefix: &str) -> (Arc<dyn Driver>, PathBuf) {
    let file_name = format!("{}.db", unique_id(prefix));
    let path = std::env::temp_dir().join(file_name);
    let url = format!("sqlite:{}", path.display());
    let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::new(url).build().unwrap());

    let mut conn = driver.acquire().await.unwrap();
    conn.execute(
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL)",
        &[],
    )
    .await
    .unwrap();

    (driver, path)
}

#[derive(Debug, serde::Deserialize, Default)]
struct Widget {
    id: i64,
    label: String,
}

#[tokio::test(flavor = "current_thread")]
async fn session_resolves_a_registered_sql_id_and_runs_it() {
    let xml = r#"
        <mapper namespace="widget">
            <insert id="create">insert into widgets (label) values (#{0})</insert>
            <select id="byId">select id, label from widgets where id = #{0}</select>
        </mapper>
    "#;
    REGISTRY
        .load_str(xml, "registry_test::session_resolves_a_registered_sql_id_and_runs_it")
        .unwrap();

    let (driver, path) = setup_sqlite("registry_resolve").await;
    let session = Session::new(driver);

    let mut insert = session.insert("widget.create");
    insert.param(&[Value::Str("sprocket".into())]);
    insert.result_rows(None).await.unwrap();
    let id = insert.last_insert_id();
    assert!(id > 0);

    let mut widget = Widget::default();
    session
        .select("widget.byId")
        .param(&[Value::I64(id)])
        .result(Some(&mut widget))
        .await
        .unwrap();
    assert_eq!(widget.label, "sprocket");

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn driver_specific_variant_is_preferred_over_the_untagged_default() {
    let xml = r#"
        <mapper namespace="widget_variant">
            <select id="ping">select 'generic' as label</select>
            <select id="ping" databaseType="sqlite">select 'sqlite-specific' as label</select>
        </mapper>
    "#;
    REGISTRY
        .load_str(
            xml,
            "registry_test::driver_specific_variant_is_preferred_over_the_untagged_default",
        )
        .unwrap();

    let (driver, path) = setup_sqlite("registry_variant").await;
    let session = Session::new(driver);

    let mut widget = Widget::default();
    session
        .select("widget_variant.ping")
        .param(&[])
        .result(Some(&mut widget))
        .await
        .unwrap();
    assert_eq!(widget.label, "sqlite-specific");

    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "current_thread")]
async fn an_unregistered_id_falls_back_to_being_treated_as_literal_sql() {
    let (driver, path) = setup_sqlite("registry_fallback").await;
    let session = Session::new(driver);

    let mut widget = Widget::default();
    session
        .select("select 1 as id, 'literal' as label")
        .param(&[])
        .result(Some(&mut widget))
        .await
        .unwrap();
    assert_eq!(widget.label, "literal");

    let _ = std::fs::remove_file(path);
}
