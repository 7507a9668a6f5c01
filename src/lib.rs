pub mod driver_manager;
pub mod errcode;
pub mod error;
pub mod executor;
pub mod param;
pub mod registry;
pub mod runner;
pub(crate) mod tpl;
pub mod udbc;

pub use error::DbError;
pub use param::Record;
pub use sqlbatis_macros::Record;

pub type Result<T> = std::result::Result<T, DbError>;

/// Builds a `Vec<Value>` from heterogeneous arguments for `Runner::param`,
/// converting each through `ToValue` the way the original's variadic
/// `Param(params ...interface{})` accepts a mix of scalars, records, and
/// slices.
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::udbc::value::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::udbc::value::ToValue::to_value(&$v)),+]
    };
}
