//! Identifier conventions shared by tables, columns, and accessors.
//!
//! Database identifiers are underscore-delimited (`first_name`), properties
//! are lower camel case (`firstName`), and accessor methods carry a
//! `get`/`set`/`is` prefix in front of the capitalized property name
//! (`setFirstName`).

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

/// Converts an underscore-delimited identifier to capitalized camel case.
///
/// ```
/// assert_eq!(dbmapper_core::naming::to_camel_case("first_name"), "FirstName");
/// assert_eq!(dbmapper_core::naming::to_camel_case("USER_ID"), "UserId");
/// ```
pub fn to_camel_case(identifier: &str) -> String {
    identifier.to_lowercase().to_upper_camel_case()
}

/// Converts a column name to the property name it maps to.
///
/// ```
/// assert_eq!(dbmapper_core::naming::property_name("first_name"), "firstName");
/// assert_eq!(dbmapper_core::naming::property_name("ID"), "id");
/// ```
pub fn property_name(column: &str) -> String {
    column.to_lowercase().to_lower_camel_case()
}

/// Converts a camel case type name to its underscore-delimited table name.
///
/// ```
/// assert_eq!(dbmapper_core::naming::to_underscores("UserAccount"), "user_account");
/// ```
pub fn to_underscores(identifier: &str) -> String {
    uncapitalize(identifier).to_snake_case()
}

/// Upper-cases the first character of a trimmed string.
pub fn capitalize(s: &str) -> String {
    let s = s.trim();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-cases the first character of a trimmed string.
pub fn uncapitalize(s: &str) -> String {
    let s = s.trim();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds an accessor method name, e.g. `("set", "first_name")` → `setFirstName`.
pub fn accessor_name(prefix: &str, column: &str) -> String {
    format!("{prefix}{}", to_camel_case(column))
}

/// Which side of a property an accessor method touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Reader,
    Writer,
}

/// Derives the property a method name refers to.
///
/// Readers may be prefixed with `get` or `is`, writers with `set`. The prefix
/// must be followed by at least one character. Returns `None` for names that
/// don't follow the convention.
///
/// ```
/// use dbmapper_core::naming::{AccessorKind, property_for_method};
///
/// assert_eq!(
///     property_for_method("getFirstName"),
///     Some((AccessorKind::Reader, "firstName".to_string()))
/// );
/// assert_eq!(
///     property_for_method("isActive"),
///     Some((AccessorKind::Reader, "active".to_string()))
/// );
/// assert_eq!(property_for_method("get"), None);
/// ```
pub fn property_for_method(method: &str) -> Option<(AccessorKind, String)> {
    let (kind, rest) = if let Some(rest) = method.strip_prefix("get") {
        (AccessorKind::Reader, rest)
    } else if let Some(rest) = method.strip_prefix("set") {
        (AccessorKind::Writer, rest)
    } else if let Some(rest) = method.strip_prefix("is") {
        (AccessorKind::Reader, rest)
    } else {
        return None;
    };

    if rest.is_empty() {
        return None;
    }
    Some((kind, uncapitalize(rest)))
}
