use crate::error::DbError;
use crate::udbc::deserializer::ValueDeserializer;
use crate::udbc::serializer::ValueSerializer;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Generic value type used to represent database-compatible values.
///
/// This enum is the intermediate representation that `ParamBinder`,
/// `TemplateRenderer`, and the driver codecs all operate on.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Represents SQL NULL or absence of value.
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Decimal(Decimal),

    /// Ordered list of values — a sequence argument before the binder joins
    /// it into a sentinel-separated positional string.
    List(Vec<Value>),

    /// Untyped key-value map argument. Only string-keyed, simple-valued
    /// entries survive binding (spec §4.1 step 5).
    Map(HashMap<String, Value>),

    /// A record argument: its declared name plus its fields in declaration
    /// order. Distinct from `Map` so the binder can tell "flatten to
    /// `Name.field` keys, don't consume a positional index" apart from "copy
    /// entries verbatim" without re-deriving type information at bind time.
    Struct(&'static str, Vec<(String, Value)>),
}

impl Value {
    /// A "simple" type per spec §4.1: a scalar the binder assigns a
    /// positional key to, as opposed to a record, sequence, or mapping.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::U8(_)
                | Value::F64(_)
                | Value::Str(_)
                | Value::Bytes(_)
                | Value::Date(_)
                | Value::Time(_)
                | Value::DateTime(_)
                | Value::DateTimeUtc(_)
                | Value::Decimal(_)
        )
    }

    /// Coerces a simple value to its string form for sequence-join
    /// expansion (spec §4.1 step 4). Returns `None` for anything the binder
    /// can't stringify, matching the original's "failure silently drops the
    /// element" behavior.
    pub fn coerce_to_string(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::I16(n) => Some(n.to_string()),
            Value::I32(n) => Some(n.to_string()),
            Value::I64(n) => Some(n.to_string()),
            Value::U8(n) => Some(n.to_string()),
            Value::F64(n) => Some(n.to_string()),
            Value::Date(d) => Some(d.to_string()),
            Value::Time(t) => Some(t.to_string()),
            Value::DateTime(dt) => Some(dt.to_string()),
            Value::DateTimeUtc(dt) => Some(dt.to_rfc3339()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Bytes(_) | Value::Null | Value::List(_) | Value::Map(_) | Value::Struct(..) => {
                None
            }
        }
    }
}

/// Converts a Rust value into the binder's intermediate `Value` tree.
///
/// Blanket-implemented for any `Serialize` type via [`ValueSerializer`];
/// `#[derive(Record)]` additionally implements it directly for structs that
/// need to be bound as named records rather than plain maps.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl<T: Serialize> ToValue for T {
    fn to_value(&self) -> Value {
        self.serialize(ValueSerializer).unwrap_or(Value::Null)
    }
}

/// Converts a `Value` (typically one assembled from a driver row) back into
/// a Rust value. Blanket-implemented for any `DeserializeOwned` type via
/// [`ValueDeserializer`].
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Result<Self, DbError>;
}

impl<T: DeserializeOwned> FromValue for T {
    fn from_value(v: Value) -> Result<Self, DbError> {
        T::deserialize(ValueDeserializer::new(v))
    }
}

/* -------------------------------------------------------------------------- */
/*                          From<T> implementations                           */
/* -------------------------------------------------------------------------- */

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
