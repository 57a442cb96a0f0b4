//! SQLite connection for `dbmapper`.
//!
//! [`SqliteConnection`] implements the [`Connection`](dbmapper_core::Connection)
//! collaborator over `rusqlite`, so a [`DbMapper`](dbmapper_core::DbMapper)
//! can insert, update, and materialize objects against a SQLite database.
//!
//! # Architecture
//!
//! - **`catalog`** — column and primary key discovery via `pragma_table_xinfo`
//! - **`convert`** — driver values ↔ SQLite storage classes
//! - **`connection`** — prepared statements, parameter binding, and
//!   generated key retrieval
//!
//! # Quick start
//!
//! ```
//! use dbmapper_core::{AccessorRegistrar, DbMapper, Mapped};
//! use dbmapper_sqlite::SqliteConnection;
//!
//! #[derive(Default)]
//! struct Person {
//!     id: i64,
//!     first_name: String,
//! }
//!
//! impl Mapped for Person {
//!     fn register(a: &mut AccessorRegistrar<Self>) {
//!         a.reader("getId", |p| p.id)
//!             .reader("getFirstName", |p| p.first_name.clone());
//!     }
//! }
//!
//! let conn = SqliteConnection::open_in_memory().unwrap();
//! conn.inner()
//!     .execute_batch("CREATE TABLE person (id INTEGER PRIMARY KEY, first_name TEXT)")
//!     .unwrap();
//!
//! let mapper = DbMapper::new(conn);
//! let id = mapper
//!     .insert(&Person { id: 0, first_name: "Ann".to_string() })
//!     .unwrap();
//! assert_eq!(id, Some(1));
//! ```
//!
//! # Storage
//!
//! Booleans and integers are stored as SQLite integers, floats as reals,
//! and dates, times, and timestamps as ISO-8601 text. Decimals are stored as
//! a blob holding their exact text, which no column affinity converts, so a
//! `DECIMAL(p,s)` or `NUMERIC` column keeps every digit. Decimal values the
//! database itself stored as reals are read back through `f64`.
//! Table names passed to the catalog must contain only alphanumeric
//! characters and underscores.

mod catalog;
mod connection;
mod convert;
mod error;

pub use connection::{SqliteConnection, SqliteStatement};
pub use error::{Result, SqliteError};
