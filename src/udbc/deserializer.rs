use crate::error::DbError;
use crate::udbc::value::Value;
use serde::de::{
    DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use std::collections::HashMap;

/// A `serde::Deserializer` over the binder's `Value` tree, used to
/// materialize driver rows (assembled as `Value::Map`) into caller-supplied
/// result types. The teacher pack carries no deserializer of its own; this
/// mirrors `ValueSerializer` in the other direction.
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

macro_rules! forward_scalar {
    ($deserialize:ident, $visit:ident, $variant:ident, $ty:ty) => {
        fn $deserialize<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self.value {
                Value::$variant(v) => visitor.$visit(v as $ty),
                other => Err(type_mismatch(stringify!($variant), &other)),
            }
        }
    };
}

fn type_mismatch(expected: &str, got: &Value) -> DbError {
    DbError::TypeMismatch(format!("expected {}, got {:?}", expected, got))
}

fn map_into_pairs(map: HashMap<String, Value>) -> std::vec::IntoIter<(String, Value)> {
    map.into_iter().collect::<Vec<_>>().into_iter()
}

impl<'de> Deserializer<'de> for ValueDeserializer {
    type Error = DbError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::I16(n) => visitor.visit_i16(n),
            Value::I32(n) => visitor.visit_i32(n),
            Value::I64(n) => visitor.visit_i64(n),
            Value::U8(n) => visitor.visit_u8(n),
            Value::F64(n) => visitor.visit_f64(n),
            Value::Str(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::Date(d) => visitor.visit_string(d.to_string()),
            Value::Time(t) => visitor.visit_string(t.to_string()),
            Value::DateTime(dt) => visitor.visit_string(dt.to_string()),
            Value::DateTimeUtc(dt) => visitor.visit_string(dt.to_rfc3339()),
            Value::Decimal(d) => visitor.visit_string(d.to_string()),
            Value::List(items) => visitor.visit_seq(SeqDeserializer {
                iter: items.into_iter(),
            }),
            Value::Map(map) => visitor.visit_map(MapDeserializer {
                iter: map_into_pairs(map),
                value: None,
            }),
            Value::Struct(_, fields) => visitor.visit_map(MapDeserializer {
                iter: fields.into_iter(),
                value: None,
            }),
        }
    }

    forward_scalar!(deserialize_bool, visit_bool, Bool, bool);
    forward_scalar!(deserialize_i16, visit_i16, I16, i16);
    forward_scalar!(deserialize_i32, visit_i32, I32, i32);
    forward_scalar!(deserialize_i64, visit_i64, I64, i64);
    forward_scalar!(deserialize_u8, visit_u8, U8, u8);
    forward_scalar!(deserialize_f64, visit_f64, F64, f64);

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::I16(n) => visitor.visit_i8(n as i8),
            other => Err(type_mismatch("i8", &other)),
        }
    }
    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::I64(n) => visitor.visit_u16(n as u16),
            Value::U8(n) => visitor.visit_u16(n as u16),
            other => Err(type_mismatch("u16", &other)),
        }
    }
    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::I64(n) => visitor.visit_u32(n as u32),
            Value::U8(n) => visitor.visit_u32(n as u32),
            other => Err(type_mismatch("u32", &other)),
        }
    }
    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::I64(n) => visitor.visit_u64(n as u64),
            Value::U8(n) => visitor.visit_u64(n as u64),
            other => Err(type_mismatch("u64", &other)),
        }
    }
    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::F64(n) => visitor.visit_f32(n as f32),
            other => Err(type_mismatch("f32", &other)),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => visitor.visit_char(c),
                    _ => Err(DbError::TypeMismatch("expected single-character string".into())),
                }
            }
            other => Err(type_mismatch("char", &other)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }
    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Str(s) => visitor.visit_string(s),
            Value::Date(d) => visitor.visit_string(d.to_string()),
            Value::Time(t) => visitor.visit_string(t.to_string()),
            Value::DateTime(dt) => visitor.visit_string(dt.to_string()),
            Value::DateTimeUtc(dt) => visitor.visit_string(dt.to_rfc3339()),
            Value::Decimal(d) => visitor.visit_string(d.to_string()),
            other => Err(type_mismatch("string", &other)),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_byte_buf(visitor)
    }
    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            other => Err(type_mismatch("bytes", &other)),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(ValueDeserializer::new(other)),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            other => Err(type_mismatch("unit", &other)),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::List(items) => visitor.visit_seq(SeqDeserializer {
                iter: items.into_iter(),
            }),
            other => Err(type_mismatch("sequence", &other)),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Map(map) => visitor.visit_map(MapDeserializer {
                iter: map_into_pairs(map),
                value: None,
            }),
            Value::Struct(_, fields) => visitor.visit_map(MapDeserializer {
                iter: fields.into_iter(),
                value: None,
            }),
            other => Err(type_mismatch("map", &other)),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.value {
            Value::Str(s) => visitor.visit_enum(s.into_deserializer()),
            Value::Map(map) if map.len() == 1 => {
                let (variant, value) = map.into_iter().next().expect("len checked above");
                visitor.visit_enum(MapEnumAccess { variant, value })
            }
            other => Err(type_mismatch("enum", &other)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = DbError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        match self.iter.next() {
            Some(v) => seed.deserialize(ValueDeserializer::new(v)).map(Some),
            None => Ok(None),
        }
    }
}

struct MapDeserializer {
    iter: std::vec::IntoIter<(String, Value)>,
    value: Option<Value>,
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = DbError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((k, v)) => {
                self.value = Some(v);
                seed.deserialize(k.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        let value = self.value.take().expect("next_value_seed called before next_key_seed");
        seed.deserialize(ValueDeserializer::new(value))
    }
}

/// Supports the `{ "Variant": <payload> }` enum encoding that falls out of
/// deserializing a row column holding a one-entry `Value::Map`.
struct MapEnumAccess {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for MapEnumAccess {
    type Error = DbError;
    type Variant = ValueDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Self::Error> {
        let variant = seed.deserialize(self.variant.into_deserializer())?;
        Ok((variant, ValueDeserializer::new(self.value)))
    }
}

impl<'de> VariantAccess<'de> for ValueDeserializer {
    type Error = DbError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, Self::Error> {
        seed.deserialize(self)
    }
    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_tuple(len, visitor)
    }
    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_struct("", fields, visitor)
    }
}

/// Deserializes a row (already assembled as a string-keyed map) into `R`.
pub fn row_from_map<R: serde::de::DeserializeOwned>(
    row: HashMap<String, Value>,
) -> Result<R, DbError> {
    R::deserialize(ValueDeserializer::new(Value::Map(row)))
}
