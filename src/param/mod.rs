//! Parameter binding: flattens heterogeneous call arguments into the single
//! string-keyed map a rendered SQL template looks names up in.
//!
//! Grounded in `reflection/parseparam.go` from the original implementation:
//! each top-level argument is classified and bound independently, in call
//! order, with a shared positional index that only scalars and sequences
//! consume.

use crate::udbc::value::{ToValue, Value};
use std::collections::HashMap;

/// Separates stringified slice elements inside the single positional value a
/// sequence argument collapses into. Preserved verbatim from the original
/// wire format so existing `<foreach>`-free templates keep working.
pub const SLICE_SEPARATOR: &str = "_&eLEm_";

/// The flattened argument map a rendered template's placeholders are looked
/// up against.
pub type ParamMap = HashMap<String, Value>;

/// Implemented by `#[derive(Record)]` for structs that bind as named
/// records (`"TypeName.field"` keys) rather than as a `Value::Map`.
///
/// Do not also derive `Serialize` on a `Record` type: the blanket
/// `ToValue for T: Serialize` impl and the macro's own `ToValue` impl would
/// conflict. Pick one.
pub trait Record {
    const NAME: &'static str;
    fn fields(&self) -> Vec<(&'static str, Value)>;
}

/// Builds the `Value::Struct` a `#[derive(Record)]` impl's generated
/// `ToValue` uses; kept separate from the trait so the macro only has to
/// call a plain function.
pub fn record_to_value<R: Record>(r: &R) -> Value {
    let fields = r
        .fields()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Value::Struct(R::NAME, fields)
}

/// Flattens each argument's `Value` form into a single `ParamMap`,
/// following the original's four-way classification:
///
/// - simple scalar: bound under the next positional index, which then
///   advances;
/// - `Value::Struct`: every field bound under `"Name.field"`, index left
///   untouched;
/// - `Value::List`: every element stringified and joined with
///   [`SLICE_SEPARATOR`], then bound as ONE positional value, advancing the
///   index once;
/// - `Value::Map`: every string-keyed, simple-valued entry copied in under
///   its own key verbatim, index untouched.
/// - everything else (`Value::Null`, and any composite value appearing where
///   none of the above matched) is ignored: no key is bound and the index
///   does not advance.
///
/// Later arguments win on key collision — deterministic because arguments
/// are processed strictly in call order.
pub fn bind(values: &[Value]) -> ParamMap {
    let mut ret = ParamMap::new();
    let mut index = 0usize;
    for v in values {
        bind_one(v, &mut ret, &mut index);
    }
    ret
}

/// Convenience wrapper over [`bind`] for callers holding `ToValue` types
/// directly, as `params!` expands to.
pub fn bind_values<T: ToValue>(args: &[T]) -> ParamMap {
    let values: Vec<Value> = args.iter().map(|a| a.to_value()).collect();
    bind(&values)
}

fn bind_one(v: &Value, ret: &mut ParamMap, index: &mut usize) {
    match v {
        _ if v.is_simple() => {
            ret.insert(index.to_string(), v.clone());
            *index += 1;
        }
        Value::Struct(name, fields) => {
            for (key, value) in fields {
                ret.insert(format!("{}.{}", name, key), value.clone());
            }
        }
        Value::List(items) => {
            let joined = items
                .iter()
                .filter_map(|elem| match elem {
                    Value::Str(s) => Some(s.clone()),
                    other => other.coerce_to_string(),
                })
                .collect::<Vec<_>>()
                .join(SLICE_SEPARATOR);
            ret.insert(index.to_string(), Value::Str(joined));
            *index += 1;
        }
        Value::Map(map) => {
            for (key, value) in map {
                if value.is_simple() {
                    ret.insert(key.clone(), value.clone());
                }
            }
        }
        // `Null` (and anything else not covered above) is ignored: it is not
        // a "simple" scalar per `Value::is_simple`, so it is neither bound
        // under a positional key nor does it advance `index`.
        _ => {}
    }
}

/// Additive typed API: unlike [`bind`], a `Value::List` argument is bound as
/// an actual `Value::List` (not joined into a string), so template
/// `<foreach>` iteration can walk real elements instead of re-splitting a
/// sentinel-joined string. Scalars and structs bind exactly as in [`bind`];
/// a bare top-level sequence is bound under `name` rather than a positional
/// index, since it has no natural index slot of its own once unflattened.
pub fn bind_seq(name: &str, values: &[Value]) -> ParamMap {
    let mut ret = bind(values);
    for v in values {
        if let Value::List(_) = v {
            ret.insert(name.to_string(), v.clone());
        }
    }
    ret
}

/// Splits a sentinel-joined positional string back into its elements.
/// `ParseSliceParamString` in the original.
pub fn parse_slice_param_string(src: &str) -> Vec<String> {
    src.split(SLICE_SEPARATOR).map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_bind_to_positional_keys_in_order() {
        let values = vec![Value::I64(1), Value::Str("two".into())];
        let map = bind(&values);
        assert_eq!(map.get("0"), Some(&Value::I64(1)));
        assert_eq!(map.get("1"), Some(&Value::Str("two".into())));
    }

    #[test]
    fn null_is_ignored_and_does_not_consume_an_index() {
        let values = vec![Value::I64(1), Value::Null, Value::I64(2)];
        let map = bind(&values);
        assert_eq!(map.get("0"), Some(&Value::I64(1)));
        assert_eq!(map.get("1"), Some(&Value::I64(2)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn struct_fields_bind_under_dotted_keys_without_consuming_an_index() {
        let values = vec![
            Value::I64(7),
            Value::Struct(
                "User",
                vec![
                    ("Name".to_string(), Value::Str("ada".into())),
                    ("Age".to_string(), Value::I32(30)),
                ],
            ),
            Value::I64(9),
        ];
        let map = bind(&values);
        assert_eq!(map.get("0"), Some(&Value::I64(7)));
        assert_eq!(map.get("User.Name"), Some(&Value::Str("ada".into())));
        assert_eq!(map.get("User.Age"), Some(&Value::I32(30)));
        assert_eq!(map.get("1"), Some(&Value::I64(9)));
    }

    #[test]
    fn slice_round_trips_through_separator() {
        let xs = vec![
            Value::Str("a".into()),
            Value::Str("b".into()),
            Value::Str("c".into()),
        ];
        let map = bind(&[Value::List(xs)]);
        let joined = match map.get("0").unwrap() {
            Value::Str(s) => s.clone(),
            _ => panic!("expected Value::Str"),
        };
        assert_eq!(parse_slice_param_string(&joined), vec!["a", "b", "c"]);
    }

    #[test]
    fn map_entries_bind_verbatim_without_consuming_an_index() {
        let mut entries = HashMap::new();
        entries.insert("limit".to_string(), Value::I64(10));
        entries.insert("nested".to_string(), Value::List(vec![]));
        let values = vec![Value::I64(1), Value::Map(entries), Value::I64(2)];
        let map = bind(&values);
        assert_eq!(map.get("0"), Some(&Value::I64(1)));
        assert_eq!(map.get("limit"), Some(&Value::I64(10)));
        assert_eq!(map.get("nested"), None);
        assert_eq!(map.get("1"), Some(&Value::I64(2)));
    }

    #[test]
    fn binding_is_deterministic_for_the_same_input() {
        let values = vec![Value::I64(1), Value::Str("x".into())];
        assert_eq!(bind(&values), bind(&values));
    }

    #[test]
    fn later_argument_wins_on_key_collision() {
        let mut first = HashMap::new();
        first.insert("id".to_string(), Value::I64(1));
        let mut second = HashMap::new();
        second.insert("id".to_string(), Value::I64(2));
        let map = bind(&[Value::Map(first), Value::Map(second)]);
        assert_eq!(map.get("id"), Some(&Value::I64(2)));
    }
}
