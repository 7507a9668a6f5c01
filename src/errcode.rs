use std::fmt;

/// A stable, process-wide singleton error code.
///
/// Identity is the `code` string, not the `ErrCode` value itself — two
/// `ErrCode`s with the same `code` (see [`EXECUTOR_QUERY_ERROR`] and
/// [`EXECUTOR_GET_CONNECTION_ERROR`]) are intentionally indistinguishable on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrCode {
    pub code: &'static str,
    pub message: &'static str,
}

impl ErrCode {
    pub const fn new(code: &'static str, message: &'static str) -> Self {
        Self { code, message }
    }
}

/// `{ "code" : "<code>", "msg" : "<msg>" }`, literal spacing preserved for
/// wire compatibility with existing deployments.
impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ \"code\" : \"{}\", \"msg\" : \"{}\" }}", self.code, self.message)
    }
}

impl std::error::Error for ErrCode {}

pub const PARSE_MODEL_TABLEINFO_FAILED: ErrCode =
    ErrCode::new("11001", "Parse model's table info failed");
pub const MODEL_NOT_REGISTER: ErrCode = ErrCode::new("11002", "Registered model not found");
pub const PARSE_SQL_VAR_ERROR: ErrCode = ErrCode::new("12001", "SQL parse error");
pub const PARSE_SQL_PARAM_ERROR: ErrCode = ErrCode::new("12002", "SQL parse parameter error");
pub const PARSE_SQL_PARAM_VAR_NUMBER_ERROR: ErrCode =
    ErrCode::new("12003", "SQL parse parameter var-number error");
pub const EXECUTOR_COMMIT_ERROR: ErrCode = ErrCode::new("21001", "Executor closed on commit");
pub const EXECUTOR_BEGIN_ERROR: ErrCode = ErrCode::new("21002", "Executor closed on begin");
/// Shared with [`EXECUTOR_GET_CONNECTION_ERROR`] — the original source reuses
/// "21003" for both "closed on exec" and "get-connection failed". Preserved
/// for wire compatibility; see DESIGN.md.
pub const EXECUTOR_QUERY_ERROR: ErrCode = ErrCode::new("21003", "Executor closed on exec");
pub const EXECUTOR_GET_CONNECTION_ERROR: ErrCode =
    ErrCode::new("21003", "Executor get connection error");
pub const TRANSACTION_WITHOUT_BEGIN: ErrCode =
    ErrCode::new("22001", "Transaction without begin");
pub const TRANSACTION_COMMIT_ERROR: ErrCode = ErrCode::new("22002", "Transaction commit error");
pub const CONNECTION_PREPARE_ERROR: ErrCode = ErrCode::new("23001", "Connection prepare error");
pub const STATEMENT_QUERY_ERROR: ErrCode = ErrCode::new("24001", "Statement query error");
pub const STATEMENT_EXEC_ERROR: ErrCode = ErrCode::new("24002", "Statement exec error");
pub const QUERY_TYPE_ERROR: ErrCode = ErrCode::new("25001", "Select data convert error");

/// Not part of the original code table (no numeric code was ever assigned to
/// it upstream) but referenced by name throughout spec §3/§4.4/§8 — a runner
/// whose `Param` never produced metadata.
pub const RUNNER_NOT_READY: ErrCode = ErrCode::new("31002", "Runner not ready");
/// A `None` destination passed to `Runner::result`. The original's sibling
/// code for a non-nil-but-unaddressable destination ("31001") has no Rust
/// equivalent — `Option<&mut T>` can't express that state — and is dropped;
/// see DESIGN.md.
pub const RESULT_POINTER_IS_NIL: ErrCode = ErrCode::new("31003", "Result pointer is nil");
