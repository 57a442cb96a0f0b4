//! Conversion between property values and database values.
//!
//! [`TypeConverterRegistry`] holds one read function and one write function
//! per [`ScalarType`]. Enums are not registered; they are always stored as
//! their variant name.
//!
//! # Offset and zoned timestamps
//!
//! Timestamps carrying an offset are written at their own offset. On read,
//! the database timestamp is taken as a wall clock in the platform's default
//! zone and given that zone's offset, truncated to whole hours. The result
//! names the same instant whenever the local offset is a whole number of
//! hours; hosts in other zones see the truncation.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use tracing::trace;

use crate::error::{MappingError, Result};
use crate::sql::{ResultSet, SqlValue, Statement};
use crate::value::{ScalarType, Value, ValueType};

/// Reads one typed value from a named column of the current row.
pub type ReadFn = fn(&dyn ResultSet, &str) -> Result<Value>;

/// Binds one typed value to a 1-based statement parameter.
pub type WriteFn = fn(&mut dyn Statement, usize, &Value) -> Result<()>;

/// Read and write functions for one scalar type.
#[derive(Clone, Copy)]
pub struct Conversion {
    pub read: ReadFn,
    pub write: WriteFn,
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion").finish_non_exhaustive()
    }
}

/// Scalar type → conversion functions.
///
/// # Examples
///
/// ```
/// use dbmapper_core::{ScalarType, TypeConverterRegistry};
///
/// let registry = TypeConverterRegistry::new();
/// assert!(registry.supports(ScalarType::Decimal));
///
/// let empty = TypeConverterRegistry::empty();
/// assert!(!empty.supports(ScalarType::Decimal));
/// ```
#[derive(Debug, Clone)]
pub struct TypeConverterRegistry {
    conversions: HashMap<ScalarType, Conversion>,
}

impl Default for TypeConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! conversion {
    ($getter:ident, $variant:ident, $sql:ident, $scalar:ident) => {
        Conversion {
            read: |rs, column| Ok(Value::$variant(rs.$getter(column)?)),
            write: |stmt, position, value| match value {
                Value::$variant(v) => stmt.bind(position, SqlValue::$sql(v.clone())),
                other => Err(MappingError::mismatch(
                    ScalarType::$scalar.rust_name(),
                    other.type_label(),
                )),
            },
        }
    };
}

impl TypeConverterRegistry {
    /// Creates a registry with every supported scalar type registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ScalarType::Bool, conversion!(get_bool, Bool, Boolean, Bool));
        registry.register(ScalarType::I8, conversion!(get_i8, I8, TinyInt, I8));
        registry.register(ScalarType::I16, conversion!(get_i16, I16, SmallInt, I16));
        registry.register(ScalarType::I32, conversion!(get_i32, I32, Integer, I32));
        registry.register(ScalarType::I64, conversion!(get_i64, I64, BigInt, I64));
        registry.register(ScalarType::F32, conversion!(get_f32, F32, Real, F32));
        registry.register(ScalarType::F64, conversion!(get_f64, F64, Double, F64));
        registry.register(
            ScalarType::Decimal,
            conversion!(get_decimal, Decimal, Decimal, Decimal),
        );
        registry.register(ScalarType::String, conversion!(get_string, String, Text, String));
        registry.register(ScalarType::Bytes, conversion!(get_bytes, Bytes, Bytes, Bytes));
        registry.register(ScalarType::Date, conversion!(get_date, Date, Date, Date));
        registry.register(ScalarType::Time, conversion!(get_time, Time, Time, Time));
        registry.register(
            ScalarType::DateTime,
            conversion!(get_timestamp, DateTime, Timestamp, DateTime),
        );
        registry.register(
            ScalarType::OffsetDateTime,
            Conversion {
                read: |rs, column| {
                    let local = rs.get_timestamp(column)?;
                    Ok(Value::OffsetDateTime(reinterpret_local(local)?))
                },
                write: |stmt, position, value| match value {
                    Value::OffsetDateTime(v) => stmt.bind(position, SqlValue::TimestampTz(*v)),
                    other => Err(MappingError::mismatch(
                        ScalarType::OffsetDateTime.rust_name(),
                        other.type_label(),
                    )),
                },
            },
        );
        registry.register(
            ScalarType::ZonedDateTime,
            Conversion {
                read: |rs, column| {
                    let local = rs.get_timestamp(column)?;
                    let offset_time = reinterpret_local(local)?;
                    let zone = zone_for_offset(*offset_time.offset())?;
                    Ok(Value::ZonedDateTime(offset_time.with_timezone(&zone)))
                },
                write: |stmt, position, value| match value {
                    Value::ZonedDateTime(v) => {
                        stmt.bind(position, SqlValue::TimestampTz(v.fixed_offset()))
                    }
                    other => Err(MappingError::mismatch(
                        ScalarType::ZonedDateTime.rust_name(),
                        other.type_label(),
                    )),
                },
            },
        );
        registry
    }

    /// Creates a registry with no scalar types registered.
    pub fn empty() -> Self {
        Self {
            conversions: HashMap::new(),
        }
    }

    /// Registers or replaces the conversion for a scalar type.
    pub fn register(&mut self, scalar: ScalarType, conversion: Conversion) -> &mut Self {
        self.conversions.insert(scalar, conversion);
        self
    }

    pub fn supports(&self, scalar: ScalarType) -> bool {
        self.conversions.contains_key(&scalar)
    }

    fn conversion(&self, scalar: ScalarType) -> Result<&Conversion> {
        self.conversions
            .get(&scalar)
            .ok_or_else(|| MappingError::UnsupportedType(scalar.rust_name().to_string()))
    }

    /// Reads `column` of the current row as `target`.
    ///
    /// A null column is `Value::Null` regardless of `target`. Enums are read
    /// from text and resolved by exact variant name; empty text is null.
    pub fn read(&self, rs: &dyn ResultSet, column: &str, target: &ValueType) -> Result<Value> {
        if rs.is_null(column)? {
            return Ok(Value::Null);
        }

        match target {
            ValueType::Enum(enum_type) => {
                let text = rs.get_string(column)?;
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                let variant =
                    enum_type
                        .variant(&text)
                        .ok_or_else(|| MappingError::UnknownEnumVariant {
                            enum_type: enum_type.name.to_string(),
                            value: text.clone(),
                        })?;
                Ok(Value::Enum(crate::value::EnumValue {
                    type_name: enum_type.name,
                    variant,
                }))
            }
            ValueType::Scalar(scalar) => (self.conversion(*scalar)?.read)(rs, column),
        }
    }

    /// Binds `value` to the 1-based `position` of `stmt`.
    pub fn write(&self, stmt: &mut dyn Statement, position: usize, value: &Value) -> Result<()> {
        trace!(position, value = ?value, "Binding parameter");
        match value {
            Value::Null => stmt.bind(position, SqlValue::Null),
            Value::Enum(e) => stmt.bind(position, SqlValue::Text(e.variant.to_string())),
            other => match other.scalar_type() {
                Some(scalar) => (self.conversion(scalar)?.write)(stmt, position, other),
                None => Err(MappingError::UnsupportedType(other.type_label())),
            },
        }
    }
}

/// Attaches the platform zone's whole-hour offset to a local wall clock.
fn reinterpret_local(local: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
    let offset_seconds = Local
        .offset_from_local_datetime(&local)
        .earliest()
        .unwrap_or_else(|| Local.offset_from_utc_datetime(&local))
        .fix()
        .local_minus_utc();
    let hours = offset_seconds / 60 / 60;
    let offset = FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| MappingError::mismatch("UTC offset", format!("{hours} hours")))?;
    offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| MappingError::mismatch("DateTime<FixedOffset>", local.to_string()))
}

/// The `Etc/GMT` zone whose offset matches `offset` in whole hours.
fn zone_for_offset(offset: FixedOffset) -> Result<Tz> {
    let hours = offset.local_minus_utc() / 3600;
    // Etc/GMT zone names carry the inverted sign: Etc/GMT-5 is UTC+05:00.
    let name = if hours == 0 {
        "Etc/GMT".to_string()
    } else {
        format!("Etc/GMT{:+}", -hours)
    };
    name.parse::<Tz>()
        .map_err(|_| MappingError::mismatch("time zone", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::BufferedResultSet;
    use crate::testing::RecordingStatement;
    use crate::value::{EnumType, FieldValue};
    use rust_decimal::Decimal;

    crate::mapped_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Level {
            Low,
            High,
        }
    }

    fn row(values: Vec<(&str, SqlValue)>) -> BufferedResultSet {
        let (columns, row): (Vec<_>, Vec<_>) = values
            .into_iter()
            .map(|(c, v)| (c.to_string(), v))
            .unzip();
        let mut rs = BufferedResultSet::new(columns, vec![row]);
        rs.next().unwrap();
        rs
    }

    #[test]
    fn test_null_column_reads_as_null_for_any_target() {
        let registry = TypeConverterRegistry::empty();
        let rs = row(vec![("level", SqlValue::Null)]);
        assert_eq!(
            registry.read(&rs, "level", &Level::value_type()).unwrap(),
            Value::Null
        );
        assert_eq!(
            registry
                .read(&rs, "level", &ValueType::Scalar(ScalarType::I64))
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_enum_read_by_exact_name() {
        let registry = TypeConverterRegistry::new();
        let rs = row(vec![
            ("a", SqlValue::Text("High".into())),
            ("b", SqlValue::Text(String::new())),
            ("c", SqlValue::Text("high".into())),
        ]);
        let target = Level::value_type();

        let value = registry.read(&rs, "a", &target).unwrap();
        assert_eq!(Level::from_value(value).unwrap(), Level::High);
        assert_eq!(registry.read(&rs, "b", &target).unwrap(), Value::Null);
        assert!(matches!(
            registry.read(&rs, "c", &target),
            Err(MappingError::UnknownEnumVariant { .. })
        ));
    }

    #[test]
    fn test_unregistered_scalar_fails() {
        let registry = TypeConverterRegistry::empty();
        let rs = row(vec![("id", SqlValue::BigInt(3))]);
        let err = registry
            .read(&rs, "id", &ValueType::Scalar(ScalarType::I64))
            .unwrap_err();
        assert_eq!(err.to_string(), "don't know how to convert type 'i64'");

        let mut stmt = RecordingStatement::default();
        assert!(matches!(
            registry.write(&mut stmt, 1, &Value::I64(3)),
            Err(MappingError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_write_null_and_enum() {
        let registry = TypeConverterRegistry::empty();
        let mut stmt = RecordingStatement::default();
        registry.write(&mut stmt, 1, &Value::Null).unwrap();
        registry
            .write(&mut stmt, 2, &Level::Low.into_value())
            .unwrap();
        assert_eq!(
            stmt.bound,
            vec![(1, SqlValue::Null), (2, SqlValue::Text("Low".into()))]
        );
    }

    #[test]
    fn test_scalar_write_binds_matching_sql_value() {
        let registry = TypeConverterRegistry::new();
        let mut stmt = RecordingStatement::default();
        let price = Decimal::new(1999, 2);
        registry.write(&mut stmt, 1, &Value::Decimal(price)).unwrap();
        registry.write(&mut stmt, 2, &Value::I16(7)).unwrap();
        registry.write(&mut stmt, 3, &Value::Bytes(vec![1, 2])).unwrap();
        assert_eq!(
            stmt.bound,
            vec![
                (1, SqlValue::Decimal(price)),
                (2, SqlValue::SmallInt(7)),
                (3, SqlValue::Bytes(vec![1, 2])),
            ]
        );
    }

    #[test]
    fn test_custom_registration_replaces_entry() {
        let mut registry = TypeConverterRegistry::new();
        registry.register(
            ScalarType::String,
            Conversion {
                read: |rs, column| Ok(Value::String(rs.get_string(column)?.to_uppercase())),
                write: |stmt, position, value| match value {
                    Value::String(v) => stmt.bind(position, SqlValue::Text(v.to_lowercase())),
                    _ => Ok(()),
                },
            },
        );
        let rs = row(vec![("name", SqlValue::Text("ann".into()))]);
        assert_eq!(
            registry
                .read(&rs, "name", &ValueType::Scalar(ScalarType::String))
                .unwrap(),
            Value::String("ANN".into())
        );
    }

    #[test]
    fn test_enum_type_lookup_is_case_sensitive() {
        let ty = EnumType {
            name: "Level",
            variants: &["Low", "High"],
        };
        assert_eq!(ty.variant("Low"), Some("Low"));
        assert_eq!(ty.variant("LOW"), None);
    }

    // Depends on the host zone: the read offset is the local offset truncated
    // to whole hours, so only the instant is compared.
    #[test]
    fn test_offset_timestamp_read_keeps_instant_in_whole_hour_zones() {
        let registry = TypeConverterRegistry::new();
        let written = DateTime::parse_from_rfc3339("2024-06-01T08:30:00+02:00").unwrap();
        let rs = row(vec![("at", SqlValue::TimestampTz(written))]);

        let read = registry
            .read(&rs, "at", &ValueType::Scalar(ScalarType::OffsetDateTime))
            .unwrap();
        let read = match read {
            Value::OffsetDateTime(v) => v,
            other => panic!("expected offset date-time, got {other:?}"),
        };
        if Local::now().offset().local_minus_utc() % 3600 == 0 {
            assert_eq!(read, written);
        }
        assert_eq!(read.offset().local_minus_utc() % 3600, 0);
    }

    #[test]
    fn test_zone_for_offset_uses_inverted_etc_names() {
        let east = FixedOffset::east_opt(5 * 3600).unwrap();
        assert_eq!(zone_for_offset(east).unwrap().name(), "Etc/GMT-5");
        let west = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(zone_for_offset(west).unwrap().name(), "Etc/GMT+3");
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(zone_for_offset(utc).unwrap().name(), "Etc/GMT");
    }
}
