//! Conversion between driver values and SQLite storage classes.
//!
//! SQLite stores integers, reals, text, and blobs. Booleans and the
//! narrower integers are stored as integers; decimals as the UTF-8 bytes of
//! their exact text form, in a blob so that `NUMERIC` affinity never turns
//! them into reals; dates, times, and naive timestamps as ISO-8601 text; offset
//! timestamps as RFC 3339 text.

use dbmapper_core::SqlValue;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

use crate::error::{Result, SqliteError};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A bound parameter.
#[derive(Debug)]
pub(crate) struct Param<'a>(pub &'a SqlValue);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let owned = match self.0 {
            SqlValue::Null => Value::Null,
            SqlValue::Boolean(v) => Value::Integer(i64::from(*v)),
            SqlValue::TinyInt(v) => Value::Integer(i64::from(*v)),
            SqlValue::SmallInt(v) => Value::Integer(i64::from(*v)),
            SqlValue::Integer(v) => Value::Integer(i64::from(*v)),
            SqlValue::BigInt(v) => Value::Integer(*v),
            SqlValue::Real(v) => Value::Real(f64::from(*v)),
            SqlValue::Double(v) => Value::Real(*v),
            SqlValue::Decimal(v) => Value::Blob(v.to_string().into_bytes()),
            SqlValue::Text(v) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            SqlValue::Bytes(v) => return Ok(ToSqlOutput::Borrowed(ValueRef::Blob(&v[..]))),
            SqlValue::Date(v) => Value::Text(v.format(DATE_FORMAT).to_string()),
            SqlValue::Time(v) => Value::Text(v.format(TIME_FORMAT).to_string()),
            SqlValue::Timestamp(v) => Value::Text(v.format(TIMESTAMP_FORMAT).to_string()),
            SqlValue::TimestampTz(v) => Value::Text(v.to_rfc3339()),
        };
        Ok(ToSqlOutput::Owned(owned))
    }
}

/// Converts a column value of a result row.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Result<SqlValue> {
    let value = match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::BigInt(v),
        ValueRef::Real(v) => SqlValue::Double(v),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| SqliteError::ConversionError(format!("invalid UTF-8 text: {e}")))?;
            SqlValue::Text(text.to_string())
        }
        ValueRef::Blob(bytes) => SqlValue::Bytes(bytes.to_vec()),
    };
    Ok(value)
}
