//! In-memory connection that records what the mapper asks of it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::error::{MappingError, Result};
use crate::sql::{
    BufferedResultSet, CatalogColumn, Connection, KeyRetrieval, ResultSet, SqlValue, Statement,
};

/// A statement that only records its bindings.
#[derive(Debug, Default)]
pub(crate) struct RecordingStatement {
    pub bound: Vec<(usize, SqlValue)>,
}

impl Statement for RecordingStatement {
    fn bind(&mut self, position: usize, value: SqlValue) -> Result<()> {
        self.bound.push((position, value));
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        Ok(Box::new(BufferedResultSet::empty()))
    }

    fn query(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        Ok(Box::new(BufferedResultSet::empty()))
    }
}

/// A statement execution seen by [`FakeConnection`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Executed {
    pub sql: String,
    pub keys: KeyRetrieval,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeConnection {
    tables: HashMap<String, (Vec<CatalogColumn>, Vec<String>)>,
    generated_key: Option<i64>,
    affected_rows: u64,
    fail_execute: bool,
    catalog_calls: Cell<usize>,
    prepared: Cell<usize>,
    executed: RefCell<Vec<Executed>>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            affected_rows: 1,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, name: &str, columns: Vec<CatalogColumn>, keys: &[&str]) -> Self {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.tables.insert(name.to_string(), (columns, keys));
        self
    }

    pub fn with_generated_key(mut self, key: i64) -> Self {
        self.generated_key = Some(key);
        self
    }

    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    pub fn failing_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.get()
    }

    pub fn prepared(&self) -> usize {
        self.prepared.get()
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.executed.borrow().clone()
    }
}

impl Connection for FakeConnection {
    fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement + '_>> {
        self.prepared.set(self.prepared.get() + 1);
        Ok(Box::new(FakeStatement {
            connection: self,
            sql: sql.to_string(),
            keys,
            params: Vec::new(),
            executed: false,
        }))
    }

    fn catalog_columns(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        self.catalog_calls.set(self.catalog_calls.get() + 1);
        Ok(self
            .tables
            .get(table)
            .map(|(columns, _)| columns.clone())
            .unwrap_or_default())
    }

    fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|(_, keys)| keys.clone())
            .unwrap_or_default())
    }
}

struct FakeStatement<'c> {
    connection: &'c FakeConnection,
    sql: String,
    keys: KeyRetrieval,
    params: Vec<SqlValue>,
    executed: bool,
}

impl Statement for FakeStatement<'_> {
    fn bind(&mut self, position: usize, value: SqlValue) -> Result<()> {
        if self.params.len() < position {
            self.params.resize(position, SqlValue::Null);
        }
        self.params[position - 1] = value;
        Ok(())
    }

    fn execute(&mut self) -> Result<u64> {
        if self.connection.fail_execute {
            return Err(MappingError::database("disk I/O error"));
        }
        self.connection.executed.borrow_mut().push(Executed {
            sql: self.sql.clone(),
            keys: self.keys,
            params: self.params.clone(),
        });
        self.executed = true;
        Ok(self.connection.affected_rows)
    }

    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        let rows = match (self.executed, self.keys, self.connection.generated_key) {
            (true, KeyRetrieval::Generated, Some(key)) => vec![vec![SqlValue::BigInt(key)]],
            _ => Vec::new(),
        };
        Ok(Box::new(BufferedResultSet::new(
            vec!["generated_key".to_string()],
            rows,
        )))
    }

    fn query(&mut self) -> Result<Box<dyn ResultSet + '_>> {
        Ok(Box::new(BufferedResultSet::empty()))
    }
}
