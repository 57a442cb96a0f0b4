//! Property accessor discovery.
//!
//! Mapped types register their accessor methods by name. The introspector
//! turns those registrations into a per-type property table, following the
//! bean convention: `getX`/`isX` read property `x`, `setX` writes it. The
//! table is built once per type and shared through an [`Arc`].

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::{MappingError, Result};
use crate::naming::{self, AccessorKind};
use crate::value::{FieldValue, Value, ValueType};

/// A Rust type that maps to a table row.
///
/// # Examples
///
/// ```
/// use dbmapper_core::{AccessorRegistrar, Mapped, Result};
///
/// #[derive(Default)]
/// struct Person {
///     id: i64,
///     first_name: Option<String>,
/// }
///
/// impl Mapped for Person {
///     fn register(a: &mut AccessorRegistrar<Self>) {
///         a.reader("getId", |p| p.id);
///         a.writer("setId", |p, v: i64| p.id = v);
///         a.reader("getFirstName", |p| p.first_name.clone());
///         a.writer("setFirstName", |p, v: Option<String>| p.first_name = v);
///     }
///
///     fn instantiate() -> Result<Self> {
///         Ok(Self::default())
///     }
/// }
///
/// assert_eq!(Person::simple_name(), "Person");
/// ```
pub trait Mapped: Any + Sized {
    /// Explicit table name; when set it is used verbatim.
    const TABLE_NAME: Option<&'static str> = None;

    /// Registers the type's accessor methods.
    fn register(accessors: &mut AccessorRegistrar<Self>);

    /// Creates an empty instance to populate from a row.
    ///
    /// Types that are never materialized from rows can keep the default,
    /// which reports that no zero-argument constructor is available.
    fn instantiate() -> Result<Self> {
        Err(MappingError::Instantiation {
            type_name: Self::simple_name().to_string(),
            reason: "no zero-argument constructor".to_string(),
        })
    }

    /// Unqualified type name, without module path or generic arguments.
    fn simple_name() -> &'static str {
        let full = type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

type ReadFn = dyn Fn(&dyn Any) -> Result<Value> + Send + Sync;
type WriteFn = dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync;

/// A registered reader method.
#[derive(Clone)]
pub struct Reader {
    method: String,
    read: Arc<ReadFn>,
}

impl Reader {
    /// Name of the reader method, e.g. `getFirstName`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Invokes the reader on `object`.
    pub fn read(&self, object: &dyn Any) -> Result<Value> {
        (self.read)(object)
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").field("method", &self.method).finish()
    }
}

/// A registered writer method and its declared parameter type.
#[derive(Clone)]
pub struct Writer {
    method: String,
    param: ValueType,
    write: Arc<WriteFn>,
}

impl Writer {
    /// Name of the writer method, e.g. `setFirstName`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Declared parameter type.
    pub fn param_type(&self) -> ValueType {
        self.param
    }

    /// Invokes the writer on `object`.
    pub fn write(&self, object: &mut dyn Any, value: Value) -> Result<()> {
        (self.write)(object, value)
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("method", &self.method)
            .field("param", &self.param)
            .finish()
    }
}

/// Reader and writer of one property; either may be missing.
#[derive(Debug, Clone, Default)]
pub struct PropertyAccessors {
    pub reader: Option<Reader>,
    pub writer: Option<Writer>,
}

fn downcast_failure<T>() -> MappingError {
    MappingError::mismatch(type_name::<T>(), "object of another type")
}

/// Collects accessor registrations for a mapped type.
pub struct AccessorRegistrar<T> {
    properties: HashMap<String, PropertyAccessors>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Mapped> AccessorRegistrar<T> {
    fn new() -> Self {
        Self {
            properties: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Registers a zero-argument reader such as `getName` or `isActive`.
    ///
    /// Names that don't follow the reader convention are ignored.
    pub fn reader<V, F>(&mut self, method: &str, read: F) -> &mut Self
    where
        V: FieldValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let Some((AccessorKind::Reader, property)) = naming::property_for_method(method) else {
            debug!(method, type_name = T::simple_name(), "Ignoring non-reader method");
            return self;
        };

        let read: Arc<ReadFn> = Arc::new(move |object: &dyn Any| {
            let object = object.downcast_ref::<T>().ok_or_else(downcast_failure::<T>)?;
            Ok(read(object).into_value())
        });
        self.properties.entry(property).or_default().reader = Some(Reader {
            method: method.to_string(),
            read,
        });
        self
    }

    /// Registers a single-argument writer such as `setName`.
    ///
    /// Names that don't follow the writer convention are ignored.
    pub fn writer<V, F>(&mut self, method: &str, write: F) -> &mut Self
    where
        V: FieldValue,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let Some((AccessorKind::Writer, property)) = naming::property_for_method(method) else {
            debug!(method, type_name = T::simple_name(), "Ignoring non-writer method");
            return self;
        };

        let write: Arc<WriteFn> = Arc::new(move |object: &mut dyn Any, value: Value| {
            let object = object.downcast_mut::<T>().ok_or_else(downcast_failure::<T>)?;
            write(object, V::from_value(value)?);
            Ok(())
        });
        self.properties.entry(property).or_default().writer = Some(Writer {
            method: method.to_string(),
            param: V::value_type(),
            write,
        });
        self
    }
}

/// Property table of one mapped type.
#[derive(Debug)]
pub struct ClassAccessors {
    type_id: TypeId,
    type_name: &'static str,
    properties: HashMap<String, PropertyAccessors>,
}

impl ClassAccessors {
    /// Builds the property table for `T` from its registrations.
    pub fn of<T: Mapped>() -> Self {
        let mut registrar = AccessorRegistrar::<T>::new();
        T::register(&mut registrar);
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::simple_name(),
            properties: registrar.properties,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property names, sorted.
    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn property(&self, property: &str) -> Option<&PropertyAccessors> {
        self.properties.get(property)
    }

    pub fn reader(&self, property: &str) -> Option<&Reader> {
        self.property(property)?.reader.as_ref()
    }

    pub fn writer(&self, property: &str) -> Option<&Writer> {
        self.property(property)?.writer.as_ref()
    }

    pub fn has_reader(&self, property: &str) -> bool {
        self.reader(property).is_some()
    }

    pub fn has_writer(&self, property: &str) -> bool {
        self.writer(property).is_some()
    }

    /// Resolves a writer by its method name, e.g. `setFirstName`.
    pub fn writer_for_method(&self, method: &str) -> Option<&Writer> {
        match naming::property_for_method(method)? {
            (AccessorKind::Writer, property) => self.writer(&property),
            (AccessorKind::Reader, _) => None,
        }
    }

    /// Declared parameter type of the writer named `method`, if it exists.
    pub fn writer_type(&self, method: &str) -> Option<ValueType> {
        self.writer_for_method(method).map(Writer::param_type)
    }

    /// Reads a property, returning `Null` when the type has no reader for it.
    pub fn read_property(&self, object: &dyn Any, property: &str) -> Result<Value> {
        match self.reader(property) {
            Some(reader) => reader.read(object),
            None => Ok(Value::Null),
        }
    }

    /// Invokes the writer named `method` if it exists; a missing writer is a no-op.
    pub fn invoke_writer(&self, object: &mut dyn Any, method: &str, value: Value) -> Result<()> {
        match self.writer_for_method(method) {
            Some(writer) => writer.write(object, value),
            None => Ok(()),
        }
    }
}

/// Per-type cache of [`ClassAccessors`].
///
/// Entries are built outside the map and published with a single
/// insert-if-absent, so concurrent first requests may both build but all
/// callers observe the same fully built table.
#[derive(Debug, Default)]
pub struct PropertyIntrospector {
    classes: DashMap<TypeId, Arc<ClassAccessors>>,
}

impl PropertyIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accessor table for `T`, building it on first use.
    pub fn accessors_for<T: Mapped>(&self) -> Arc<ClassAccessors> {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.classes.get(&type_id) {
            return Arc::clone(existing.value());
        }

        let built = Arc::new(ClassAccessors::of::<T>());
        debug!(
            type_name = built.type_name(),
            properties = ?built.property_names(),
            "Discovered property accessors"
        );
        Arc::clone(self.classes.entry(type_id).or_insert(built).value())
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
