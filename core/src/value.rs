//! Property values and the closed set of scalar types the mapper supports.
//!
//! A [`Value`] is what property readers return and property writers accept.
//! Rust types take part in mapping by implementing [`FieldValue`], which is
//! provided for every supported scalar, for `Option<T>` of any of them, and
//! for enums declared with [`mapped_enum!`](crate::mapped_enum).

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};

/// Scalar types known to the conversion registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    OffsetDateTime,
    ZonedDateTime,
}

impl ScalarType {
    /// Every scalar type, in registration order.
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Bool,
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::F32,
        ScalarType::F64,
        ScalarType::Decimal,
        ScalarType::String,
        ScalarType::Bytes,
        ScalarType::Date,
        ScalarType::Time,
        ScalarType::DateTime,
        ScalarType::OffsetDateTime,
        ScalarType::ZonedDateTime,
    ];

    /// Rust name of the type this scalar maps to.
    pub fn rust_name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Decimal => "Decimal",
            ScalarType::String => "String",
            ScalarType::Bytes => "Vec<u8>",
            ScalarType::Date => "NaiveDate",
            ScalarType::Time => "NaiveTime",
            ScalarType::DateTime => "NaiveDateTime",
            ScalarType::OffsetDateTime => "DateTime<FixedOffset>",
            ScalarType::ZonedDateTime => "DateTime<Tz>",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rust_name())
    }
}

/// Description of an enum whose variants are stored by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumType {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumType {
    /// Looks up a variant by exact name.
    pub fn variant(&self, name: &str) -> Option<&'static str> {
        self.variants.iter().copied().find(|v| *v == name)
    }
}

/// The declared type of a property writer's parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    Enum(EnumType),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(scalar) => scalar.fmt(f),
            ValueType::Enum(e) => f.write_str(e.name),
        }
    }
}

/// One variant of a mapped enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: &'static str,
    pub variant: &'static str,
}

/// A property value on the object side of the mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    OffsetDateTime(DateTime<FixedOffset>),
    ZonedDateTime(DateTime<Tz>),
    Enum(EnumValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime scalar type of this value; `None` for nulls and enums.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        let ty = match self {
            Value::Null | Value::Enum(_) => return None,
            Value::Bool(_) => ScalarType::Bool,
            Value::I8(_) => ScalarType::I8,
            Value::I16(_) => ScalarType::I16,
            Value::I32(_) => ScalarType::I32,
            Value::I64(_) => ScalarType::I64,
            Value::F32(_) => ScalarType::F32,
            Value::F64(_) => ScalarType::F64,
            Value::Decimal(_) => ScalarType::Decimal,
            Value::String(_) => ScalarType::String,
            Value::Bytes(_) => ScalarType::Bytes,
            Value::Date(_) => ScalarType::Date,
            Value::Time(_) => ScalarType::Time,
            Value::DateTime(_) => ScalarType::DateTime,
            Value::OffsetDateTime(_) => ScalarType::OffsetDateTime,
            Value::ZonedDateTime(_) => ScalarType::ZonedDateTime,
        };
        Some(ty)
    }

    /// Short description used in conversion errors.
    pub fn type_label(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Enum(e) => format!("enum {}", e.type_name),
            other => other
                .scalar_type()
                .map(|ty| ty.to_string())
                .unwrap_or_default(),
        }
    }
}

/// A Rust type that can be read from and written to a property.
pub trait FieldValue: Sized + 'static {
    /// The declared type writers of this type accept.
    fn value_type() -> ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! scalar_field {
    ($ty:ty, $scalar:ident) => {
        impl FieldValue for $ty {
            fn value_type() -> ValueType {
                ValueType::Scalar(ScalarType::$scalar)
            }

            fn into_value(self) -> Value {
                Value::$scalar(self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$scalar(v) => Ok(v),
                    other => Err(MappingError::mismatch(
                        ScalarType::$scalar.rust_name(),
                        other.type_label(),
                    )),
                }
            }
        }
    };
}

scalar_field!(bool, Bool);
scalar_field!(i8, I8);
scalar_field!(i16, I16);
scalar_field!(i32, I32);
scalar_field!(i64, I64);
scalar_field!(f32, F32);
scalar_field!(f64, F64);
scalar_field!(Decimal, Decimal);
scalar_field!(String, String);
scalar_field!(Vec<u8>, Bytes);
scalar_field!(NaiveDate, Date);
scalar_field!(NaiveTime, Time);
scalar_field!(NaiveDateTime, DateTime);
scalar_field!(DateTime<FixedOffset>, OffsetDateTime);
scalar_field!(DateTime<Tz>, ZonedDateTime);

impl<T: FieldValue> FieldValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Declares an enum that is stored in the database by variant name.
///
/// Only fieldless variants are supported. The generated
/// [`FieldValue`](crate::FieldValue) impl resolves stored text by exact
/// variant name.
///
/// ```
/// dbmapper_core::mapped_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Status {
///         Active,
///         Suspended,
///     }
/// }
///
/// use dbmapper_core::{FieldValue, Value};
/// assert!(matches!(Status::Active.into_value(), Value::Enum(e) if e.variant == "Active"));
/// ```
#[macro_export]
macro_rules! mapped_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::FieldValue for $name {
            fn value_type() -> $crate::ValueType {
                $crate::ValueType::Enum($crate::EnumType {
                    name: stringify!($name),
                    variants: &[$(stringify!($variant)),+],
                })
            }

            fn into_value(self) -> $crate::Value {
                let variant = match self {
                    $($name::$variant => stringify!($variant)),+
                };
                $crate::Value::Enum($crate::EnumValue {
                    type_name: stringify!($name),
                    variant,
                })
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                let name = match value {
                    $crate::Value::Enum(e) => e.variant,
                    other => {
                        return Err($crate::MappingError::TypeMismatch {
                            expected: stringify!($name).to_string(),
                            found: other.type_label(),
                        });
                    }
                };
                $(
                    if name == stringify!($variant) {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::MappingError::UnknownEnumVariant {
                    enum_type: stringify!($name).to_string(),
                    value: name.to_string(),
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::mapped_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Color {
            Red,
            Green,
        }
    }

    #[test]
    fn test_option_maps_none_to_null() {
        assert_eq!(None::<i64>.into_value(), Value::Null);
        assert_eq!(Some(5_i64).into_value(), Value::I64(5));
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn test_required_field_rejects_null() {
        let err = i64::from_value(Value::Null).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_scalar_mismatch() {
        let err = String::from_value(Value::I32(3)).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert i32 into String");
    }

    #[test]
    fn test_enum_roundtrip_through_value() {
        let value = Color::Green.into_value();
        assert_eq!(value.scalar_type(), None);
        assert_eq!(Color::from_value(value).unwrap(), Color::Green);

        match Color::value_type() {
            ValueType::Enum(e) => {
                assert_eq!(e.name, "Color");
                assert_eq!(e.variant("Red"), Some("Red"));
                assert_eq!(e.variant("red"), None);
            }
            other => panic!("unexpected value type {other:?}"),
        }
    }

    #[test]
    fn test_scalar_types_are_distinct() {
        let unique: std::collections::HashSet<_> = ScalarType::ALL.iter().collect();
        assert_eq!(unique.len(), ScalarType::ALL.len());
    }
}
