//! The mapping engine.
//!
//! [`DbMapper`] inserts and updates mapped objects and materializes them
//! from result rows. Table metadata, accessor tables, and update plans are
//! computed on first use and kept in a [`MapperCache`], which can be shared
//! between mappers over different connections.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::accessor::{Mapped, PropertyIntrospector};
use crate::config::MapperConfig;
use crate::convert::TypeConverterRegistry;
use crate::error::{MappingError, Result};
use crate::naming;
use crate::sql::{Connection, KeyRetrieval, ResultSet};
use crate::table::{TableMetadata, TableMetadataCache, UpdatePlan};
use crate::value::Value;

/// Accessor tables and table metadata shared by one or more mappers.
#[derive(Debug, Default)]
pub struct MapperCache {
    introspector: PropertyIntrospector,
    tables: TableMetadataCache,
}

impl MapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn introspector(&self) -> &PropertyIntrospector {
        &self.introspector
    }

    pub fn tables(&self) -> &TableMetadataCache {
        &self.tables
    }
}

/// Maps objects to and from the tables of one connection.
///
/// # Examples
///
/// ```no_run
/// use dbmapper_core::{AccessorRegistrar, Connection, DbMapper, Mapped, Result};
///
/// #[derive(Default)]
/// struct Person {
///     id: i64,
///     first_name: String,
/// }
///
/// impl Mapped for Person {
///     fn register(a: &mut AccessorRegistrar<Self>) {
///         a.reader("getId", |p| p.id)
///             .writer("setId", |p, v: i64| p.id = v)
///             .reader("getFirstName", |p| p.first_name.clone())
///             .writer("setFirstName", |p, v: String| p.first_name = v);
///     }
///
///     fn instantiate() -> Result<Self> {
///         Ok(Self::default())
///     }
/// }
///
/// fn rename<C: Connection>(mapper: &DbMapper<C>, id: i64) -> Result<u64> {
///     let person = Person { id, first_name: "Ann".to_string() };
///     mapper.update(&person)
/// }
/// ```
#[derive(Debug)]
pub struct DbMapper<C> {
    connection: C,
    converters: TypeConverterRegistry,
    cache: Arc<MapperCache>,
    config: MapperConfig,
}

impl<C: Connection> DbMapper<C> {
    /// Creates a mapper with its own cache and the default converters.
    pub fn new(connection: C) -> Self {
        Self::with_cache(connection, Arc::new(MapperCache::new()))
    }

    /// Creates a mapper that shares `cache` with other mappers.
    pub fn with_cache(connection: C, cache: Arc<MapperCache>) -> Self {
        Self {
            connection,
            converters: TypeConverterRegistry::new(),
            cache,
            config: MapperConfig::default(),
        }
    }

    /// Replaces the conversion registry.
    pub fn with_converters(mut self, converters: TypeConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    pub fn cache(&self) -> &Arc<MapperCache> {
        &self.cache
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Resolves the table `T` maps to.
    ///
    /// An explicit [`Mapped::TABLE_NAME`] wins, then a configured override
    /// for the type's simple name, then the simple name in underscore form.
    pub fn table_name<T: Mapped>(&self) -> String {
        if let Some(name) = T::TABLE_NAME {
            return name.to_string();
        }
        let simple = T::simple_name();
        match self.config.table_name_for(simple) {
            Some(name) => name.to_string(),
            None => naming::to_underscores(simple),
        }
    }

    pub fn table_metadata(&self, table: &str) -> Result<Arc<TableMetadata>> {
        self.cache.tables.metadata_for(&self.connection, table)
    }

    /// Update plan for `T` against `table`, built on first use.
    pub fn update_plan<T: Mapped>(&self, table: &str) -> Result<Arc<UpdatePlan>> {
        let metadata = self.table_metadata(table)?;
        let accessors = self.cache.introspector.accessors_for::<T>();
        metadata.update_plan(&accessors)
    }

    /// Inserts `object` into its table.
    ///
    /// Returns the first key the database generated, if any.
    pub fn insert<T: Mapped>(&self, object: &T) -> Result<Option<i64>> {
        self.insert_into(&self.table_name::<T>(), object)
    }

    /// Inserts `object` into `table`.
    ///
    /// Only non-null properties of columns the database doesn't generate are
    /// written. Fails with [`MappingError::NothingToInsert`] before touching
    /// the connection when every such property is null.
    pub fn insert_into<T: Mapped>(&self, table: &str, object: &T) -> Result<Option<i64>> {
        let metadata = self.table_metadata(table)?;
        let accessors = self.cache.introspector.accessors_for::<T>();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in metadata.columns().filter(|c| !c.is_auto_generated) {
            let value = accessors.read_property(object, &column.property_name)?;
            if !value.is_null() {
                columns.push(column.name.as_str());
                values.push(value);
            }
        }
        if values.is_empty() {
            return Err(MappingError::NothingToInsert {
                table: table.to_string(),
            });
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        self.log_statement(&sql, &values);

        let mut statement = self.connection.prepare(&sql, KeyRetrieval::Generated)?;
        for (index, value) in values.iter().enumerate() {
            self.converters.write(statement.as_mut(), index + 1, value)?;
        }
        statement.execute()?;

        let mut keys = statement.generated_keys()?;
        if !keys.next()? {
            debug!(table, "Insert generated no keys");
            return Ok(None);
        }
        let key = keys.value_at(1)?.to_i64()?;
        Ok(Some(key))
    }

    /// Updates the row of `object`'s table identified by its primary key.
    ///
    /// Returns the number of affected rows.
    pub fn update<T: Mapped>(&self, object: &T) -> Result<u64> {
        self.update_table(&self.table_name::<T>(), object)
    }

    /// Updates the row of `table` identified by `object`'s primary key.
    pub fn update_table<T: Mapped>(&self, table: &str, object: &T) -> Result<u64> {
        let plan = self.update_plan::<T>(table)?;
        let values = plan
            .parameters()
            .map(|reader| reader.read(object))
            .collect::<Result<Vec<_>>>()?;
        self.log_statement(&plan.sql, &values);

        let mut statement = self.connection.prepare(&plan.sql, KeyRetrieval::None)?;
        for (index, value) in values.iter().enumerate() {
            self.converters.write(statement.as_mut(), index + 1, value)?;
        }
        statement.execute()
    }

    /// Builds a `T` from the current row of `rows`.
    ///
    /// Each column `c` is delivered to the writer `set` + camel case of `c`
    /// when `T` has one; other columns are skipped. The cursor is not moved.
    pub fn build_single<T: Mapped>(&self, rows: &dyn ResultSet) -> Result<T> {
        let accessors = self.cache.introspector.accessors_for::<T>();
        let mut object = T::instantiate()?;

        for column in rows.column_names() {
            let method = naming::accessor_name("set", &column);
            let Some(writer) = accessors.writer_for_method(&method) else {
                trace!(column = %column, method = %method, "No writer for column");
                continue;
            };
            let value = self.converters.read(rows, &column, &writer.param_type())?;
            writer.write(&mut object, value)?;
        }
        Ok(object)
    }

    /// Builds one `T` per remaining row, in row order.
    pub fn build_list<T: Mapped>(&self, rows: &mut dyn ResultSet) -> Result<Vec<T>> {
        let mut objects = Vec::new();
        while rows.next()? {
            objects.push(self.build_single(&*rows)?);
        }
        debug!(
            type_name = T::simple_name(),
            count = objects.len(),
            "Built objects from rows"
        );
        Ok(objects)
    }

    fn log_statement(&self, sql: &str, values: &[Value]) {
        if self.config.log_sql {
            info!(sql, parameters = values.len(), "Executing statement");
        } else {
            debug!(sql, parameters = values.len(), "Executing statement");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorRegistrar;
    use crate::sql::{BufferedResultSet, CatalogColumn, SqlValue};
    use crate::testing::FakeConnection;

    crate::mapped_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Status {
            Active,
            Suspended,
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Person {
        id: i64,
        first_name: Option<String>,
        age: Option<i32>,
        status: Option<Status>,
    }

    impl Mapped for Person {
        fn register(a: &mut AccessorRegistrar<Self>) {
            a.reader("getId", |p| p.id)
                .writer("setId", |p, v: i64| p.id = v)
                .reader("getFirstName", |p| p.first_name.clone())
                .writer("setFirstName", |p, v: Option<String>| p.first_name = v)
                .reader("getAge", |p| p.age)
                .writer("setAge", |p, v: Option<i32>| p.age = v)
                .reader("getStatus", |p| p.status)
                .writer("setStatus", |p, v: Option<Status>| p.status = v);
        }

        fn instantiate() -> Result<Self> {
            Ok(Self::default())
        }
    }

    struct Audit {
        note: Option<String>,
    }

    impl Mapped for Audit {
        const TABLE_NAME: Option<&'static str> = Some("AUDIT_LOG");

        fn register(a: &mut AccessorRegistrar<Self>) {
            a.reader("getNote", |p| p.note.clone());
        }
    }

    struct OrderLine;

    impl Mapped for OrderLine {
        fn register(_: &mut AccessorRegistrar<Self>) {}
    }

    fn person_connection() -> FakeConnection {
        FakeConnection::new().with_table(
            "person",
            vec![
                CatalogColumn::new("id", true),
                CatalogColumn::new("first_name", false),
                CatalogColumn::new("age", false),
                CatalogColumn::new("status", false),
            ],
            &["id"],
        )
    }

    #[test]
    fn test_table_name_resolution() {
        let mapper = DbMapper::new(FakeConnection::new());
        assert_eq!(mapper.table_name::<Person>(), "person");
        assert_eq!(mapper.table_name::<OrderLine>(), "order_line");
        assert_eq!(mapper.table_name::<Audit>(), "AUDIT_LOG");

        let config = MapperConfig::from_yaml_str("table_names: { OrderLine: lines, Audit: x }")
            .unwrap();
        let mapper = DbMapper::new(FakeConnection::new()).with_config(config);
        assert_eq!(mapper.table_name::<OrderLine>(), "lines");
        assert_eq!(mapper.table_name::<Audit>(), "AUDIT_LOG");
    }

    #[test]
    fn test_insert_skips_generated_and_null_columns() {
        let mapper = DbMapper::new(person_connection().with_generated_key(42));
        let person = Person {
            id: 5,
            first_name: Some("Ann".to_string()),
            age: None,
            status: Some(Status::Active),
        };

        assert_eq!(mapper.insert(&person).unwrap(), Some(42));

        let executed = mapper.connection().executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].sql,
            "INSERT INTO person (first_name, status) VALUES (?, ?)"
        );
        assert_eq!(executed[0].keys, KeyRetrieval::Generated);
        assert_eq!(
            executed[0].params,
            vec![
                SqlValue::Text("Ann".to_string()),
                SqlValue::Text("Active".to_string())
            ]
        );
    }

    #[test]
    fn test_insert_without_generated_key_returns_none() {
        let mapper = DbMapper::new(person_connection());
        let person = Person {
            age: Some(30),
            ..Person::default()
        };
        assert_eq!(mapper.insert(&person).unwrap(), None);
    }

    #[test]
    fn test_all_null_insert_prepares_nothing() {
        let mapper = DbMapper::new(person_connection());
        let err = mapper.insert(&Person::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "all values were null, so no insert could be performed into 'person'"
        );
        assert_eq!(mapper.connection().prepared(), 0);
    }

    #[test]
    fn test_update_binds_set_then_key_values() {
        let mapper = DbMapper::new(person_connection().with_affected_rows(1));
        let person = Person {
            id: 9,
            first_name: Some("Bo".to_string()),
            age: None,
            status: None,
        };

        assert_eq!(mapper.update(&person).unwrap(), 1);
        assert_eq!(mapper.update(&person).unwrap(), 1);

        let executed = mapper.connection().executed();
        assert_eq!(
            executed[0].sql,
            "UPDATE person SET first_name=?, age=?, status=? WHERE id=?"
        );
        assert_eq!(
            executed[0].params,
            vec![
                SqlValue::Text("Bo".to_string()),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::BigInt(9)
            ]
        );
        assert_eq!(mapper.connection().catalog_calls(), 1);

        let first = mapper.update_plan::<Person>("person").unwrap();
        let second = mapper.update_plan::<Person>("person").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_driver_failure_is_wrapped_once() {
        let mapper = DbMapper::new(person_connection().failing_execute());
        let person = Person {
            id: 1,
            first_name: Some("Cy".to_string()),
            ..Person::default()
        };
        let err = mapper.update(&person).unwrap_err();
        assert!(matches!(err, MappingError::Database(_)));
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "database error: disk I/O error");
    }

    #[test]
    fn test_build_single_delivers_matching_columns() {
        let mapper = DbMapper::new(FakeConnection::new());
        let mut rows = BufferedResultSet::new(
            vec![
                "id".to_string(),
                "first_name".to_string(),
                "legacy_flag".to_string(),
            ],
            vec![vec![
                SqlValue::BigInt(7),
                SqlValue::Text("Ann".to_string()),
                SqlValue::Boolean(true),
            ]],
        );
        rows.next().unwrap();

        let person: Person = mapper.build_single(&rows).unwrap();
        assert_eq!(person.id, 7);
        assert_eq!(person.first_name.as_deref(), Some("Ann"));
        assert_eq!(person.age, None);
    }

    #[test]
    fn test_build_single_null_into_required_property_fails() {
        let mapper = DbMapper::new(FakeConnection::new());
        let mut rows = BufferedResultSet::new(vec!["id".to_string()], vec![vec![SqlValue::Null]]);
        rows.next().unwrap();
        assert!(matches!(
            mapper.build_single::<Person>(&rows),
            Err(MappingError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_build_single_requires_constructor() {
        let mapper = DbMapper::new(FakeConnection::new());
        let mut rows = BufferedResultSet::new(vec!["note".to_string()], vec![vec![SqlValue::Null]]);
        rows.next().unwrap();
        assert!(matches!(
            mapper.build_single::<Audit>(&rows),
            Err(MappingError::Instantiation { .. })
        ));
    }

    #[test]
    fn test_build_list_preserves_row_order() {
        let mapper = DbMapper::new(FakeConnection::new());
        let mut rows = BufferedResultSet::new(
            vec!["ID".to_string(), "STATUS".to_string()],
            vec![
                vec![SqlValue::BigInt(1), SqlValue::Text("Active".to_string())],
                vec![SqlValue::BigInt(2), SqlValue::Null],
                vec![SqlValue::BigInt(3), SqlValue::Text("Suspended".to_string())],
            ],
        );

        let people: Vec<Person> = mapper.build_list(&mut rows).unwrap();
        let ids: Vec<_> = people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(people[0].status, Some(Status::Active));
        assert_eq!(people[1].status, None);
        assert_eq!(people[2].status, Some(Status::Suspended));

        let mut empty = BufferedResultSet::new(vec!["id".to_string()], Vec::new());
        assert!(mapper.build_list::<Person>(&mut empty).unwrap().is_empty());
    }

    #[test]
    fn test_cache_shared_between_mappers() {
        let cache = Arc::new(MapperCache::new());
        let first = DbMapper::with_cache(person_connection(), Arc::clone(&cache));
        let second = DbMapper::with_cache(person_connection(), Arc::clone(&cache));

        let a = first.table_metadata("person").unwrap();
        let b = second.table_metadata("person").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(second.connection().catalog_calls(), 0);
    }
}
