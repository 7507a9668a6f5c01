use crate::Result;
use crate::error::DbError;
use crate::errcode::{RESULT_POINTER_IS_NIL, RUNNER_NOT_READY};
use crate::executor::exec::map_rows;
use crate::executor::session::{dispatch_execute, dispatch_last_insert_id, dispatch_query};
use crate::param;
use crate::registry::DynamicTemplate;
use crate::tpl::{self, Action, Metadata};
use crate::udbc::driver::Driver;
use crate::udbc::value::{FromValue, Value};
use log::warn;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-call execution context: carries a cancellation handle a caller can
/// trip to abandon an in-flight `Runner` operation. The teacher has no
/// async cancellation primitive of its own — grounded instead in the
/// `tokio_util::sync::CancellationToken` pattern used for long-running
/// client calls elsewhere in the retrieval pack.
#[derive(Debug, Clone, Default)]
pub struct RunnerContext {
    cancellation: CancellationToken,
}

impl RunnerContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// One SQL operation in flight. `action` is fixed at construction and never
/// changes; `metadata` moves Fresh -> Bound as `param` binds successfully;
/// `executed` moves Bound -> Executed/Terminal once a result method runs.
///
/// Replaces the original's self-pointer `this Runner` / embedded
/// `BaseRunner` polymorphism (`SelectRunner`/`InsertRunner`/.../ embedding
/// `BaseRunner`) with one tagged-variant struct — `self.action` drives
/// dispatch instead of virtual methods on four distinct types.
pub struct Runner {
    pool: Arc<dyn Driver>,
    template_name: String,
    template: DynamicTemplate,
    action: Action,
    metadata: Option<Metadata>,
    executed: bool,
    last_insert_id: i64,
    ctx: RunnerContext,
}

impl Runner {
    fn new(
        pool: Arc<dyn Driver>,
        template_name: String,
        template: DynamicTemplate,
        action: Action,
    ) -> Self {
        Self {
            pool,
            template_name,
            template,
            action,
            metadata: None,
            executed: false,
            last_insert_id: -1,
            ctx: RunnerContext::new(),
        }
    }

    pub(crate) fn new_select(pool: Arc<dyn Driver>, template_name: String, template: DynamicTemplate) -> Self {
        Self::new(pool, template_name, template, Action::Select)
    }

    pub(crate) fn new_insert(pool: Arc<dyn Driver>, template_name: String, template: DynamicTemplate) -> Self {
        Self::new(pool, template_name, template, Action::Insert)
    }

    pub(crate) fn new_update(pool: Arc<dyn Driver>, template_name: String, template: DynamicTemplate) -> Self {
        Self::new(pool, template_name, template, Action::Update)
    }

    pub(crate) fn new_delete(pool: Arc<dyn Driver>, template_name: String, template: DynamicTemplate) -> Self {
        Self::new(pool, template_name, template, Action::Delete)
    }

    /// Renders and binds `values` against this runner's template (always
    /// call, even with no parameters). On success, if the rendered
    /// statement's action matches this runner's fixed action, the result
    /// becomes the runner's bound metadata; on a mismatch, or on a
    /// render/parse failure, nothing changes and a warning is logged.
    /// Mirrors the original `BaseRunner.Param`.
    pub fn param(&mut self, values: &[Value]) -> &mut Self {
        let param_map = param::bind(values);
        match tpl::parse_with_param_map(
            &self.template_name,
            self.template.as_str(),
            &param_map,
            self.pool.as_ref(),
        ) {
            Ok(md) if md.action == self.action => {
                self.metadata = Some(md);
            }
            Ok(md) => {
                warn!(
                    "sql action not match expect {:?} get {:?}",
                    self.action, md.action
                );
            }
            Err(e) => {
                warn!("{}", e);
            }
        }
        self
    }

    /// Attaches a cancellation-aware execution context to this runner.
    pub fn context(&mut self, ctx: RunnerContext) -> &mut Self {
        self.ctx = ctx;
        self
    }

    fn check_ready(&self) -> Result<&Metadata> {
        match self.metadata.as_ref() {
            Some(md) => Ok(md),
            None => {
                warn!("sql metadata is nil");
                Err(DbError::Coded(&RUNNER_NOT_READY))
            }
        }
    }

    fn check_not_cancelled(&self) -> Result<()> {
        if self.ctx.is_cancelled() {
            return Err(DbError::DbError("runner context cancelled".to_string()));
        }
        Ok(())
    }

    /// Runs this runner's bound Select statement and writes the first row
    /// into `dest`. `dest` must be `Some`, or `RESULT_POINTER_IS_NIL`.
    pub async fn result<T: DeserializeOwned>(&mut self, dest: Option<&mut T>) -> Result<()> {
        let metadata = self.check_ready()?.clone();
        let Some(dest) = dest else {
            return Err(DbError::Coded(&RESULT_POINTER_IS_NIL));
        };
        self.check_not_cancelled()?;

        let rows = dispatch_query(
            &self.pool,
            &self.template_name,
            &metadata.prepare_sql,
            &metadata.params,
        )
        .await?;
        let mapped: Vec<T> = map_rows(rows)?;
        if let Some(first) = mapped.into_iter().next() {
            *dest = first;
        }
        self.executed = true;
        Ok(())
    }

    /// Runs this runner's bound Insert/Update/Delete statement, writing the
    /// affected-row count into `dest` when present, and always returning it
    /// too. For an Insert runner, the driver's auto-generated id is also
    /// captured for later retrieval via `last_insert_id`.
    pub async fn result_rows(&mut self, dest: Option<&mut u64>) -> Result<u64> {
        if self.action == Action::Select {
            return Err(DbError::Coded(&RUNNER_NOT_READY));
        }
        let metadata = self.check_ready()?.clone();
        self.check_not_cancelled()?;

        let affected = dispatch_execute(
            &self.pool,
            &self.template_name,
            &metadata.prepare_sql,
            &metadata.params,
        )
        .await?;

        if self.action == Action::Insert {
            self.last_insert_id = dispatch_last_insert_id(&self.pool).await.unwrap_or(-1);
        }

        if let Some(dest) = dest {
            *dest = affected;
        }
        self.executed = true;
        Ok(affected)
    }

    /// The driver's auto-generated id from the last successful Insert
    /// `result_rows` call; `-1` for every other runner kind, or before one
    /// has run.
    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    /// Whether a result method has run to completion on this runner.
    pub fn is_executed(&self) -> bool {
        self.executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DynamicTemplate;
    use crate::udbc::connection::Connection;
    use crate::udbc::sqlite::pool::SqliteDriver;

    fn driver() -> Arc<dyn Driver> {
        Arc::new(SqliteDriver::new("sqlite::memory:").build().unwrap())
    }

    /// A file-backed driver, for tests that need two independent
    /// `acquire()` calls (outside a transaction) to see the same data.
    /// `"sqlite::memory:"` hands out a brand-new, empty database on every
    /// single `acquire()` — fine for single-connection tests, wrong for a
    /// multi-step round trip.
    fn file_driver(prefix: &str) -> (Arc<dyn Driver>, std::path::PathBuf) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("{prefix}_{nanos}.db"));
        let url = format!("sqlite:{}", path.display());
        (
            Arc::new(SqliteDriver::new(url).build().unwrap()),
            path,
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn select_without_param_stays_not_ready() {
        let mut runner = Runner::new_select(
            driver(),
            "t".into(),
            DynamicTemplate::from("select 1 as one"),
        );
        let mut dest: Option<i64> = None;
        let err = runner.result(dest.as_mut()).await.unwrap_err();
        assert_eq!(err.code().map(|c| c.code), Some(RUNNER_NOT_READY.code));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn action_mismatch_leaves_metadata_unset() {
        let mut runner = Runner::new_insert(
            driver(),
            "t".into(),
            DynamicTemplate::from("select 1"),
        );
        runner.param(&[]);
        let err = runner.result_rows(None).await.unwrap_err();
        assert_eq!(err.code().map(|c| c.code), Some(RUNNER_NOT_READY.code));
    }

    #[derive(serde::Deserialize)]
    struct Row {
        id: i64,
        name: String,
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_then_select_round_trip() {
        let (pool, path) = file_driver("runner_insert_then_select_round_trip");
        {
            let mut conn = pool.acquire().await.unwrap();
            conn.execute(
                "create table t (id integer primary key autoincrement, name text)",
                &[],
            )
            .await
            .unwrap();
        }

        let mut insert = Runner::new_insert(
            pool.clone(),
            "t.insert".into(),
            DynamicTemplate::from("insert into t (name) values (#{0})"),
        );
        insert.param(&[Value::Str("ada".into())]);
        let affected = insert.result_rows(None).await.unwrap();
        assert_eq!(affected, 1);
        assert!(insert.last_insert_id() > 0);

        let mut select = Runner::new_select(
            pool.clone(),
            "t.byId".into(),
            DynamicTemplate::from("select id, name from t where id = #{0}"),
        );
        select.param(&[Value::I64(insert.last_insert_id())]);
        let mut row = Row { id: 0, name: String::new() };
        select.result(Some(&mut row)).await.unwrap();
        assert_eq!(row.name, "ada");
        assert!(select.is_executed());

        let _ = std::fs::remove_file(path);
    }
}
