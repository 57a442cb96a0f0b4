//! Table metadata discovered from the database catalog.
//!
//! [`TableMetadataCache`] reads a table's columns and primary key once and
//! keeps the result for the life of the cache. Update plans for each mapped
//! type are attached to the [`TableMetadata`] they were built against.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use tracing::debug;

use crate::accessor::{ClassAccessors, Reader};
use crate::error::{MappingError, Result};
use crate::naming;
use crate::sql::Connection;

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    /// Property the column maps to, e.g. `firstName` for `first_name`.
    pub property_name: String,
    pub is_primary_key: bool,
    pub is_auto_generated: bool,
}

/// Columns of one table, in catalog order, plus the update plans built
/// against it.
#[derive(Debug)]
pub struct TableMetadata {
    table_name: String,
    columns: IndexMap<String, Column>,
    plans: DashMap<TypeId, Arc<UpdatePlan>>,
}

impl TableMetadata {
    /// Builds metadata from catalog information.
    ///
    /// Every name in `primary_keys` must be one of `columns`.
    pub fn from_catalog(
        table_name: &str,
        columns: Vec<crate::sql::CatalogColumn>,
        primary_keys: &[String],
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(MappingError::UnknownTable(table_name.to_string()));
        }

        let mut by_name: IndexMap<String, Column> = columns
            .into_iter()
            .map(|c| {
                let column = Column {
                    property_name: naming::property_name(&c.name),
                    name: c.name,
                    is_primary_key: false,
                    is_auto_generated: c.auto_generated,
                };
                (column.name.clone(), column)
            })
            .collect();

        for key in primary_keys {
            let column = by_name
                .get_mut(key)
                .ok_or_else(|| MappingError::CatalogMismatch {
                    table: table_name.to_string(),
                    column: key.clone(),
                })?;
            column.is_primary_key = true;
        }

        Ok(Self {
            table_name: table_name.to_string(),
            columns: by_name,
            plans: DashMap::new(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in catalog order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns().filter(|c| c.is_primary_key)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the update plan for the type described by `accessors`,
    /// building and attaching it on first use.
    ///
    /// A failed build is not cached; the next call tries again.
    pub fn update_plan(&self, accessors: &ClassAccessors) -> Result<Arc<UpdatePlan>> {
        let type_id = accessors.type_id();
        if let Some(existing) = self.plans.get(&type_id) {
            return Ok(Arc::clone(existing.value()));
        }

        let built = Arc::new(UpdatePlan::build(self, accessors)?);
        debug!(
            table = %self.table_name,
            type_name = accessors.type_name(),
            sql = %built.sql,
            "Built update plan"
        );
        Ok(Arc::clone(self.plans.entry(type_id).or_insert(built).value()))
    }

    /// Number of update plans attached to this table.
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }
}

impl Serialize for TableMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let columns: Vec<&Column> = self.columns().collect();
        let mut state = serializer.serialize_struct("TableMetadata", 2)?;
        state.serialize_field("table_name", &self.table_name)?;
        state.serialize_field("columns", &columns)?;
        state.end()
    }
}

/// A prepared `UPDATE` for one (table, type) pair.
///
/// Parameters are bound in `set_accessors` order followed by
/// `key_accessors` order.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub sql: String,
    pub set_columns: Vec<String>,
    pub key_columns: Vec<String>,
    pub set_accessors: Vec<Reader>,
    pub key_accessors: Vec<Reader>,
}

impl UpdatePlan {
    fn build(table: &TableMetadata, accessors: &ClassAccessors) -> Result<Self> {
        let mut set_columns = Vec::new();
        let mut set_accessors = Vec::new();
        let mut key_columns = Vec::new();
        let mut key_accessors = Vec::new();

        for column in table.columns() {
            let reader = accessors.reader(&column.property_name);
            if column.is_primary_key {
                let reader = reader.ok_or_else(|| MappingError::MissingKeyGetter {
                    table: table.table_name.clone(),
                    column: column.name.clone(),
                })?;
                key_columns.push(column.name.clone());
                key_accessors.push(reader.clone());
            } else if let Some(reader) = reader {
                set_columns.push(column.name.clone());
                set_accessors.push(reader.clone());
            }
        }

        if set_columns.is_empty() {
            return Err(MappingError::NoUpdatableColumns {
                table: table.table_name.clone(),
            });
        }
        if key_columns.is_empty() {
            return Err(MappingError::NoKeyColumns {
                table: table.table_name.clone(),
            });
        }

        let assignments: Vec<String> = set_columns.iter().map(|c| format!("{c}=?")).collect();
        let conditions: Vec<String> = key_columns.iter().map(|c| format!("{c}=?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table.table_name,
            assignments.join(", "),
            conditions.join(" AND ")
        );

        Ok(Self {
            sql,
            set_columns,
            key_columns,
            set_accessors,
            key_accessors,
        })
    }

    /// Readers in parameter order.
    pub fn parameters(&self) -> impl Iterator<Item = &Reader> {
        self.set_accessors.iter().chain(&self.key_accessors)
    }
}

/// Table name → metadata, populated from the catalog on first request.
#[derive(Debug, Default)]
pub struct TableMetadataCache {
    tables: DashMap<String, Arc<TableMetadata>>,
}

impl TableMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata for `table`, querying the catalog on first use.
    pub fn metadata_for<C: Connection + ?Sized>(
        &self,
        connection: &C,
        table: &str,
    ) -> Result<Arc<TableMetadata>> {
        if let Some(existing) = self.tables.get(table) {
            return Ok(Arc::clone(existing.value()));
        }

        let columns = connection.catalog_columns(table)?;
        let keys = connection.primary_keys(table)?;
        let built = Arc::new(TableMetadata::from_catalog(table, columns, &keys)?);
        debug!(
            table,
            columns = built.len(),
            primary_keys = ?keys,
            "Discovered table metadata"
        );
        Ok(Arc::clone(
            self.tables.entry(table.to_string()).or_insert(built).value(),
        ))
    }

    /// Cached metadata for `table`, without touching the catalog.
    pub fn get(&self, table: &str) -> Option<Arc<TableMetadata>> {
        self.tables.get(table).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
