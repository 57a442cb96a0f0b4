//! [`Connection`] implementation over `rusqlite`.

use std::path::Path;

use dbmapper_core::sql::{
    BufferedResultSet, CatalogColumn, Connection, KeyRetrieval, ResultSet, SqlValue, Statement,
};
use rusqlite::params_from_iter;
use tracing::{debug, trace};

use crate::catalog;
use crate::convert::{Param, from_value_ref};
use crate::error::{Result, SqliteError};

/// A SQLite database the mapper can work against.
///
/// # Examples
///
/// ```
/// use dbmapper_core::sql::Connection;
/// use dbmapper_sqlite::SqliteConnection;
///
/// let conn = SqliteConnection::open_in_memory().unwrap();
/// conn.inner()
///     .execute_batch("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
///     .unwrap();
/// assert_eq!(conn.primary_keys("person").unwrap(), vec!["id"]);
/// ```
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening SQLite database");
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    /// Wraps an already open `rusqlite` connection.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns a reference to the underlying `rusqlite` connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn into_inner(self) -> rusqlite::Connection {
        self.conn
    }
}

impl Connection for SqliteConnection {
    fn prepare(
        &self,
        sql: &str,
        keys: KeyRetrieval,
    ) -> dbmapper_core::Result<Box<dyn Statement + '_>> {
        let stmt = self.conn.prepare(sql).map_err(SqliteError::from)?;
        Ok(Box::new(SqliteStatement {
            conn: &self.conn,
            stmt,
            params: Vec::new(),
            keys,
            generated: None,
        }))
    }

    fn catalog_columns(&self, table: &str) -> dbmapper_core::Result<Vec<CatalogColumn>> {
        Ok(catalog::catalog_columns(&self.conn, table)?)
    }

    fn primary_keys(&self, table: &str) -> dbmapper_core::Result<Vec<String>> {
        Ok(catalog::primary_keys(&self.conn, table)?)
    }
}

/// A prepared SQLite statement with its pending parameters.
pub struct SqliteStatement<'conn> {
    conn: &'conn rusqlite::Connection,
    stmt: rusqlite::Statement<'conn>,
    params: Vec<SqlValue>,
    keys: KeyRetrieval,
    generated: Option<i64>,
}

impl SqliteStatement<'_> {
    fn run(&mut self) -> Result<u64> {
        let changed = self.stmt.execute(params_from_iter(self.params.iter().map(Param)))?;
        // SQLite reports the rowid of the last successful insert on the
        // connection; it is only meaningful when this statement changed rows.
        self.generated = match self.keys {
            KeyRetrieval::Generated if changed > 0 => Some(self.conn.last_insert_rowid()),
            _ => None,
        };
        Ok(changed as u64)
    }

    fn rows(&mut self) -> Result<BufferedResultSet> {
        let columns: Vec<String> = self
            .stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut buffered = Vec::new();
        let mut rows = self.stmt.query(params_from_iter(self.params.iter().map(Param)))?;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| from_value_ref(row.get_ref(i)?))
                .collect::<Result<Vec<_>>>()?;
            buffered.push(values);
        }
        trace!(rows = buffered.len(), "Buffered query result");
        Ok(BufferedResultSet::new(columns, buffered))
    }
}

impl Statement for SqliteStatement<'_> {
    fn bind(&mut self, position: usize, value: SqlValue) -> dbmapper_core::Result<()> {
        if position == 0 {
            return Err(SqliteError::InvalidPosition(position).into());
        }
        if self.params.len() < position {
            self.params.resize(position, SqlValue::Null);
        }
        self.params[position - 1] = value;
        Ok(())
    }

    fn execute(&mut self) -> dbmapper_core::Result<u64> {
        Ok(self.run()?)
    }

    fn generated_keys(&mut self) -> dbmapper_core::Result<Box<dyn ResultSet + '_>> {
        let rows = self
            .generated
            .map(|key| vec![vec![SqlValue::BigInt(key)]])
            .unwrap_or_default();
        Ok(Box::new(BufferedResultSet::new(
            vec!["last_insert_rowid()".to_string()],
            rows,
        )))
    }

    fn query(&mut self) -> dbmapper_core::Result<Box<dyn ResultSet + '_>> {
        Ok(Box::new(self.rows()?))
    }
}
