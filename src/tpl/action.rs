use crate::errcode::PARSE_SQL_VAR_ERROR;
use crate::error::DbError;

/// The statement kind a template resolves to, detected from its leading
/// keyword. Drives both `Runner` dispatch and the action-mismatch guard
/// (spec §4.1/§8: a runner whose bound statement doesn't match its fixed
/// action logs a warning and leaves its metadata unset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Select => "SELECT",
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        }
    }
}

/// Detects the action from the leading keyword of a (possibly un-rendered)
/// SQL template, case-insensitively. Detection runs on the un-rendered
/// source so a `${}` literal substitution can never disturb which action a
/// template is classified as.
pub fn detect_action(sql: &str) -> Result<Action, DbError> {
    let first_word = sql
        .trim_start()
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("");

    match first_word.to_ascii_uppercase().as_str() {
        "SELECT" => Ok(Action::Select),
        "INSERT" => Ok(Action::Insert),
        "UPDATE" => Ok(Action::Update),
        "DELETE" => Ok(Action::Delete),
        _ => Err(DbError::Coded(&PARSE_SQL_VAR_ERROR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_action_case_insensitively() {
        assert_eq!(detect_action("select * from t").unwrap(), Action::Select);
        assert_eq!(detect_action("  Insert into t").unwrap(), Action::Insert);
        assert_eq!(detect_action("UPDATE t set x=1").unwrap(), Action::Update);
        assert_eq!(detect_action("delete from t").unwrap(), Action::Delete);
    }

    #[test]
    fn unknown_leading_keyword_is_an_error() {
        assert!(detect_action("merge into t").is_err());
    }
}
