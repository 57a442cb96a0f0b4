//! Table catalog queries.
//!
//! Columns come from `pragma_table_xinfo`, which also reports generated
//! columns. A column counts as generated by the database when it is a
//! generated column or the table's single-column `INTEGER PRIMARY KEY`
//! (an alias for the rowid). `WITHOUT ROWID` tables have no rowid, so their
//! `INTEGER PRIMARY KEY` is an ordinary column the caller must supply.

use dbmapper_core::sql::CatalogColumn;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SqliteError};

/// `hidden` values reported for generated columns (virtual, stored).
const GENERATED_VIRTUAL: i64 = 2;
const GENERATED_STORED: i64 = 3;
/// `hidden` value of hidden columns of virtual tables.
const HIDDEN: i64 = 1;

/// Validates that a table name contains only alphanumeric characters and underscores.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() || !table.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

#[derive(Debug)]
struct ColumnInfo {
    name: String,
    declared_type: String,
    key_position: i64,
    hidden: i64,
}

fn column_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    validate_table_name(table)?;
    let mut stmt = conn.prepare(
        "SELECT name, type, pk, hidden FROM pragma_table_xinfo(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                key_position: row.get(2)?,
                hidden: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns.into_iter().filter(|c| c.hidden != HIDDEN).collect())
}

/// Whether `table` was declared `WITHOUT ROWID`. Unknown tables report false.
fn without_rowid(conn: &Connection, table: &str) -> Result<bool> {
    let flag: Option<i64> = conn
        .query_row(
            "SELECT wr FROM pragma_table_list(?1) LIMIT 1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(flag == Some(1))
}

/// Columns of `table` in declaration order.
pub(crate) fn catalog_columns(conn: &Connection, table: &str) -> Result<Vec<CatalogColumn>> {
    let columns = column_info(conn, table)?;
    let has_rowid = !columns.is_empty() && !without_rowid(conn, table)?;
    let key_count = columns.iter().filter(|c| c.key_position > 0).count();

    Ok(columns
        .iter()
        .map(|c| {
            let rowid_alias = has_rowid
                && key_count == 1
                && c.key_position > 0
                && c.declared_type.eq_ignore_ascii_case("INTEGER");
            let generated = matches!(c.hidden, GENERATED_VIRTUAL | GENERATED_STORED);
            CatalogColumn::new(c.name.clone(), rowid_alias || generated)
        })
        .collect())
}

/// Primary key columns of `table`, in key order.
pub(crate) fn primary_keys(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut keys: Vec<ColumnInfo> = column_info(conn, table)?
        .into_iter()
        .filter(|c| c.key_position > 0)
        .collect();
    keys.sort_by_key(|c| c.key_position);
    Ok(keys.into_iter().map(|c| c.name).collect())
}
