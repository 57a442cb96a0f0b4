//! Mapper configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! table_names:
//!   Person: people
//!   OrderLine: order_lines
//! log_sql: true
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings that adjust how types map to tables.
///
/// Every field is optional in YAML; an empty document is the default
/// configuration.
///
/// # Examples
///
/// ```
/// use dbmapper_core::MapperConfig;
///
/// let config = MapperConfig::from_yaml_str("table_names: { Person: people }").unwrap();
/// assert_eq!(config.table_name_for("Person"), Some("people"));
/// assert!(!config.log_sql);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Type simple name → table name. Consulted when the type declares no
    /// explicit table name.
    pub table_names: BTreeMap<String, String>,
    /// Log every executed statement at info level.
    pub log_sql: bool,
}

impl MapperConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Config`](crate::MappingError::Config) if the file cannot be
    /// read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Table name override for a type's simple name.
    pub fn table_name_for(&self, type_name: &str) -> Option<&str> {
        self.table_names.get(type_name).map(String::as_str)
    }
}
