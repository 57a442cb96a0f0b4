//! Connection collaborator interface.
//!
//! The mapper never talks to a database directly. It prepares statements,
//! binds positional parameters, walks result cursors, and reads catalog
//! information through the traits in this module. `dbmapper-sqlite`
//! provides an implementation over `rusqlite`; other drivers implement the
//! same three traits.
//!
//! Statements and cursors are owned values. Releasing them is `Drop`'s job,
//! so every exit path (including `?`) releases them in reverse acquisition
//! order and a failing release can never mask the error being returned.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::{MappingError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A value as bound to a statement parameter or read from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Boolean(v) => write!(f, "{v}"),
            SqlValue::TinyInt(v) => write!(f, "{v}"),
            SqlValue::SmallInt(v) => write!(f, "{v}"),
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::BigInt(v) => write!(f, "{v}"),
            SqlValue::Real(v) => write!(f, "{v}"),
            SqlValue::Double(v) => write!(f, "{v}"),
            SqlValue::Decimal(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "'{v}'"),
            SqlValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::Date(v) => write!(f, "{v}"),
            SqlValue::Time(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{v}"),
            SqlValue::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Boolean(_) => "BOOLEAN",
            SqlValue::TinyInt(_) => "TINYINT",
            SqlValue::SmallInt(_) => "SMALLINT",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::BigInt(_) => "BIGINT",
            SqlValue::Real(_) => "REAL",
            SqlValue::Double(_) => "DOUBLE",
            SqlValue::Decimal(_) => "DECIMAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Bytes(_) => "BYTES",
            SqlValue::Date(_) => "DATE",
            SqlValue::Time(_) => "TIME",
            SqlValue::Timestamp(_) => "TIMESTAMP",
            SqlValue::TimestampTz(_) => "TIMESTAMP WITH TIME ZONE",
        }
    }

    fn mismatch(&self, expected: &str) -> MappingError {
        MappingError::mismatch(expected, format!("{} value {self}", self.kind()))
    }

    fn integral(&self) -> Option<i64> {
        match self {
            SqlValue::Boolean(v) => Some(i64::from(*v)),
            SqlValue::TinyInt(v) => Some(i64::from(*v)),
            SqlValue::SmallInt(v) => Some(i64::from(*v)),
            SqlValue::Integer(v) => Some(i64::from(*v)),
            SqlValue::BigInt(v) => Some(*v),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self {
            SqlValue::Boolean(v) => Ok(*v),
            SqlValue::Text(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            SqlValue::Text(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            other => other
                .integral()
                .map(|v| v != 0)
                .ok_or_else(|| other.mismatch("bool")),
        }
    }

    pub fn to_i64(&self) -> Result<i64> {
        self.integral().ok_or_else(|| self.mismatch("i64"))
    }

    pub fn to_i32(&self) -> Result<i32> {
        let v = self.to_i64()?;
        i32::try_from(v).map_err(|_| self.mismatch("i32"))
    }

    pub fn to_i16(&self) -> Result<i16> {
        let v = self.to_i64()?;
        i16::try_from(v).map_err(|_| self.mismatch("i16"))
    }

    pub fn to_i8(&self) -> Result<i8> {
        let v = self.to_i64()?;
        i8::try_from(v).map_err(|_| self.mismatch("i8"))
    }

    pub fn to_f64(&self) -> Result<f64> {
        match self {
            SqlValue::Real(v) => Ok(f64::from(*v)),
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Decimal(v) => v.to_string().parse().map_err(|_| self.mismatch("f64")),
            SqlValue::Text(v) => v.trim().parse().map_err(|_| self.mismatch("f64")),
            other => other
                .integral()
                .map(|v| v as f64)
                .ok_or_else(|| other.mismatch("f64")),
        }
    }

    pub fn to_f32(&self) -> Result<f32> {
        match self {
            SqlValue::Real(v) => Ok(*v),
            _ => self.to_f64().map(|v| v as f32),
        }
    }

    pub fn to_decimal(&self) -> Result<Decimal> {
        match self {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::Text(v) => v.trim().parse().map_err(|_| self.mismatch("Decimal")),
            SqlValue::Bytes(v) => std::str::from_utf8(v)
                .ok()
                .and_then(|text| text.trim().parse().ok())
                .ok_or_else(|| self.mismatch("Decimal")),
            SqlValue::Real(v) => Decimal::try_from(*v).map_err(|_| self.mismatch("Decimal")),
            SqlValue::Double(v) => Decimal::try_from(*v).map_err(|_| self.mismatch("Decimal")),
            other => other
                .integral()
                .map(Decimal::from)
                .ok_or_else(|| other.mismatch("Decimal")),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        match self {
            SqlValue::Null => Err(self.mismatch("String")),
            SqlValue::Text(v) => Ok(v.clone()),
            SqlValue::Bytes(v) => String::from_utf8(v.clone()).map_err(|_| self.mismatch("String")),
            SqlValue::Date(v) => Ok(v.format(DATE_FORMAT).to_string()),
            SqlValue::Time(v) => Ok(v.format(TIME_FORMAT).to_string()),
            SqlValue::Timestamp(v) => Ok(v.format(TIMESTAMP_FORMATS[0]).to_string()),
            SqlValue::TimestampTz(v) => Ok(v.to_rfc3339()),
            SqlValue::Boolean(v) => Ok(v.to_string()),
            SqlValue::TinyInt(v) => Ok(v.to_string()),
            SqlValue::SmallInt(v) => Ok(v.to_string()),
            SqlValue::Integer(v) => Ok(v.to_string()),
            SqlValue::BigInt(v) => Ok(v.to_string()),
            SqlValue::Real(v) => Ok(v.to_string()),
            SqlValue::Double(v) => Ok(v.to_string()),
            SqlValue::Decimal(v) => Ok(v.to_string()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            SqlValue::Bytes(v) => Ok(v.clone()),
            SqlValue::Text(v) => Ok(v.clone().into_bytes()),
            other => Err(other.mismatch("Vec<u8>")),
        }
    }

    pub fn to_date(&self) -> Result<NaiveDate> {
        match self {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::Timestamp(v) => Ok(v.date()),
            SqlValue::TimestampTz(v) => Ok(v.with_timezone(&Local).date_naive()),
            SqlValue::Text(v) => NaiveDate::parse_from_str(v.trim(), DATE_FORMAT)
                .or_else(|_| self.to_timestamp().map(|ts| ts.date()))
                .map_err(|_| self.mismatch("NaiveDate")),
            other => Err(other.mismatch("NaiveDate")),
        }
    }

    pub fn to_time(&self) -> Result<NaiveTime> {
        match self {
            SqlValue::Time(v) => Ok(*v),
            SqlValue::Timestamp(v) => Ok(v.time()),
            SqlValue::Text(v) => NaiveTime::parse_from_str(v.trim(), TIME_FORMAT)
                .map_err(|_| self.mismatch("NaiveTime")),
            other => Err(other.mismatch("NaiveTime")),
        }
    }

    /// Reads a timestamp as a wall clock in the platform's default zone.
    ///
    /// Values carrying an offset are converted to local time; naive values
    /// are returned unchanged.
    pub fn to_timestamp(&self) -> Result<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(v) => Ok(*v),
            SqlValue::TimestampTz(v) => Ok(v.with_timezone(&Local).naive_local()),
            SqlValue::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
            SqlValue::Text(v) => {
                let text = v.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                    return Ok(dt.with_timezone(&Local).naive_local());
                }
                TIMESTAMP_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                    .ok_or_else(|| self.mismatch("NaiveDateTime"))
            }
            other => Err(other.mismatch("NaiveDateTime")),
        }
    }
}

/// Whether a prepared statement should make generated keys available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    None,
    Generated,
}

/// One column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    /// Whether the database assigns the value on insert.
    pub auto_generated: bool,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, auto_generated: bool) -> Self {
        Self {
            name: name.into(),
            auto_generated,
        }
    }
}

/// A database connection.
pub trait Connection {
    /// Prepares a statement with `?` positional placeholders.
    fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement + '_>>;

    /// Lists the columns of a table in catalog order.
    fn catalog_columns(&self, table: &str) -> Result<Vec<CatalogColumn>>;

    /// Lists the primary key column names of a table.
    fn primary_keys(&self, table: &str) -> Result<Vec<String>>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement + '_>> {
        (**self).prepare(sql, keys)
    }

    fn catalog_columns(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        (**self).catalog_columns(table)
    }

    fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        (**self).primary_keys(table)
    }
}

/// A prepared statement.
pub trait Statement {
    /// Binds a value to a 1-based parameter position.
    fn bind(&mut self, position: usize, value: SqlValue) -> Result<()>;

    /// Executes the statement and returns the number of affected rows.
    fn execute(&mut self) -> Result<u64>;

    /// Returns the keys generated by the last execution.
    ///
    /// The cursor is empty when the statement was prepared without
    /// [`KeyRetrieval::Generated`] or the database generated nothing.
    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet + '_>>;

    /// Executes the statement as a query.
    fn query(&mut self) -> Result<Box<dyn ResultSet + '_>>;
}

/// A forward-only cursor over result rows.
///
/// The cursor starts before the first row; [`next`](ResultSet::next) moves
/// it forward. Column lookups by name are case-insensitive.
pub trait ResultSet {
    /// Advances to the next row, returning `false` once exhausted.
    fn next(&mut self) -> Result<bool>;

    /// Column names of the result, in select order.
    fn column_names(&self) -> Vec<String>;

    /// Value of a named column in the current row.
    fn value(&self, column: &str) -> Result<SqlValue>;

    /// Value of a 1-based column index in the current row.
    fn value_at(&self, index: usize) -> Result<SqlValue>;

    fn is_null(&self, column: &str) -> Result<bool> {
        Ok(self.value(column)?.is_null())
    }

    fn get_bool(&self, column: &str) -> Result<bool> {
        self.value(column)?.to_bool()
    }

    fn get_i8(&self, column: &str) -> Result<i8> {
        self.value(column)?.to_i8()
    }

    fn get_i16(&self, column: &str) -> Result<i16> {
        self.value(column)?.to_i16()
    }

    fn get_i32(&self, column: &str) -> Result<i32> {
        self.value(column)?.to_i32()
    }

    fn get_i64(&self, column: &str) -> Result<i64> {
        self.value(column)?.to_i64()
    }

    fn get_f32(&self, column: &str) -> Result<f32> {
        self.value(column)?.to_f32()
    }

    fn get_f64(&self, column: &str) -> Result<f64> {
        self.value(column)?.to_f64()
    }

    fn get_decimal(&self, column: &str) -> Result<Decimal> {
        self.value(column)?.to_decimal()
    }

    fn get_string(&self, column: &str) -> Result<String> {
        self.value(column)?.to_text()
    }

    fn get_bytes(&self, column: &str) -> Result<Vec<u8>> {
        self.value(column)?.to_bytes()
    }

    fn get_date(&self, column: &str) -> Result<NaiveDate> {
        self.value(column)?.to_date()
    }

    fn get_time(&self, column: &str) -> Result<NaiveTime> {
        self.value(column)?.to_time()
    }

    fn get_timestamp(&self, column: &str) -> Result<NaiveDateTime> {
        self.value(column)?.to_timestamp()
    }
}

/// A result cursor over rows held in memory.
///
/// Drivers whose native cursors borrow their statement can collect rows
/// into this type and hand it out as a `Box<dyn ResultSet>`.
#[derive(Debug, Clone, Default)]
pub struct BufferedResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    position: Option<usize>,
}

impl BufferedResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
        }
    }

    /// An empty cursor with no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn current(&self) -> Result<&[SqlValue]> {
        self.position
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
            .ok_or_else(|| MappingError::database("result set is not positioned on a row"))
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| MappingError::database(format!("no such column: {column}")))
    }
}

impl ResultSet for BufferedResultSet {
    fn next(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |i| i + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn value(&self, column: &str) -> Result<SqlValue> {
        let index = self.column_index(column)?;
        self.value_at(index + 1)
    }

    fn value_at(&self, index: usize) -> Result<SqlValue> {
        let row = self.current()?;
        index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .cloned()
            .ok_or_else(|| MappingError::database(format!("column index out of range: {index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> BufferedResultSet {
        BufferedResultSet::new(
            vec!["id".to_string(), "first_name".to_string()],
            vec![
                vec![SqlValue::BigInt(1), SqlValue::Text("Ann".to_string())],
                vec![SqlValue::BigInt(2), SqlValue::Null],
            ],
        )
    }

    #[test]
    fn test_buffered_cursor_walks_rows() {
        let mut rs = people();
        assert!(rs.value("id").is_err(), "cursor starts before the first row");

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_i64("ID").unwrap(), 1);
        assert_eq!(rs.get_string("first_name").unwrap(), "Ann");

        assert!(rs.next().unwrap());
        assert!(rs.is_null("first_name").unwrap());
        assert_eq!(rs.value_at(1).unwrap(), SqlValue::BigInt(2));

        assert!(!rs.next().unwrap());
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_unknown_column_is_a_database_error() {
        let mut rs = people();
        rs.next().unwrap();
        assert!(matches!(rs.value("missing"), Err(MappingError::Database(_))));
        assert!(rs.value_at(0).is_err());
        assert!(rs.value_at(3).is_err());
    }

    #[test]
    fn test_integer_coercions() {
        assert!(SqlValue::BigInt(1).to_bool().unwrap());
        assert!(!SqlValue::Integer(0).to_bool().unwrap());
        assert_eq!(SqlValue::BigInt(120).to_i8().unwrap(), 120);
        assert!(SqlValue::BigInt(300).to_i8().is_err());
        assert_eq!(SqlValue::Text("42".into()).to_i64().unwrap(), 42);
        assert!(SqlValue::Text("abc".into()).to_i64().is_err());
    }

    #[test]
    fn test_decimal_from_text_is_exact() {
        let d = SqlValue::Text("12345.6789".into()).to_decimal().unwrap();
        assert_eq!(d.to_string(), "12345.6789");
    }

    #[test]
    fn test_decimal_from_text_bytes_is_exact() {
        let d = SqlValue::Bytes(b"12345678901234567.8901".to_vec())
            .to_decimal()
            .unwrap();
        assert_eq!(d.to_string(), "12345678901234567.8901");
        assert!(SqlValue::Bytes(vec![0xff]).to_decimal().is_err());
    }

    #[test]
    fn test_temporal_text_parsing() {
        let date = SqlValue::Text("2024-02-29".into()).to_date().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let time = SqlValue::Text("13:45:10.250".into()).to_time().unwrap();
        assert_eq!(time, NaiveTime::from_hms_milli_opt(13, 45, 10, 250).unwrap());

        let ts = SqlValue::Text("2024-02-29 13:45:10".into())
            .to_timestamp()
            .unwrap();
        assert_eq!(ts, date.and_hms_opt(13, 45, 10).unwrap());

        let ts = SqlValue::Text("2024-02-29T13:45:10.5".into())
            .to_timestamp()
            .unwrap();
        assert_eq!(ts, date.and_hms_milli_opt(13, 45, 10, 500).unwrap());
    }
}
