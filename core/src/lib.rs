//! Convention-based mapping between Rust structs and relational table rows.
//!
//! This crate maps plain structs to tables without per-type SQL:
//!
//! - [`Mapped`]: a type registers its `getX`/`setX`/`isX` accessors once;
//!   properties are matched to columns by name (`first_name` ↔ `firstName`).
//! - [`DbMapper`]: inserts and updates objects and builds them from result
//!   rows, over any [`Connection`](sql::Connection).
//! - [`TypeConverterRegistry`]: converts between property [`Value`]s and
//!   driver [`SqlValue`](sql::SqlValue)s for a closed set of scalar types
//!   plus enums declared with [`mapped_enum!`].
//! - [`MapperCache`]: table metadata, accessor tables, and update plans,
//!   computed once and shareable between mappers.
//!
//! # Example
//!
//! ```
//! use dbmapper_core::sql::{BufferedResultSet, ResultSet, SqlValue};
//! use dbmapper_core::*;
//!
//! mapped_enum! {
//!     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//!     pub enum Role {
//!         Admin,
//!         Guest,
//!     }
//! }
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     role: Option<Role>,
//! }
//!
//! impl Mapped for User {
//!     fn register(a: &mut AccessorRegistrar<Self>) {
//!         a.reader("getId", |u| u.id)
//!             .writer("setId", |u, v: i64| u.id = v)
//!             .reader("getRole", |u| u.role)
//!             .writer("setRole", |u, v: Option<Role>| u.role = v);
//!     }
//!
//!     fn instantiate() -> Result<Self> {
//!         Ok(Self::default())
//!     }
//! }
//!
//! let mut rows = BufferedResultSet::new(
//!     vec!["id".to_string(), "role".to_string()],
//!     vec![vec![SqlValue::BigInt(3), SqlValue::Text("Admin".to_string())]],
//! );
//! # struct NoConnection;
//! # impl sql::Connection for NoConnection {
//! #     fn prepare(&self, _: &str, _: sql::KeyRetrieval) -> Result<Box<dyn sql::Statement + '_>> {
//! #         unimplemented!()
//! #     }
//! #     fn catalog_columns(&self, _: &str) -> Result<Vec<sql::CatalogColumn>> { Ok(Vec::new()) }
//! #     fn primary_keys(&self, _: &str) -> Result<Vec<String>> { Ok(Vec::new()) }
//! # }
//! let mapper = DbMapper::new(NoConnection);
//! let users: Vec<User> = mapper.build_list(&mut rows).unwrap();
//! assert_eq!(users[0].id, 3);
//! assert_eq!(users[0].role, Some(Role::Admin));
//! ```

mod accessor;
mod config;
mod convert;
mod error;
mod mapper;
pub mod naming;
pub mod sql;
mod table;
mod value;

#[cfg(test)]
mod testing;

pub use accessor::{
    AccessorRegistrar, ClassAccessors, Mapped, PropertyAccessors, PropertyIntrospector, Reader,
    Writer,
};
pub use config::MapperConfig;
pub use convert::{Conversion, ReadFn, TypeConverterRegistry, WriteFn};
pub use error::{DriverError, MappingError, Result};
pub use mapper::{DbMapper, MapperCache};
pub use sql::{Connection, ResultSet, SqlValue, Statement};
pub use table::{Column, TableMetadata, TableMetadataCache, UpdatePlan};
pub use value::{EnumType, EnumValue, FieldValue, ScalarType, Value, ValueType};
