//! Configuration table schemas and values.

use indexmap::IndexMap;

use super::entity::LiteralValue;

/// Declared configuration table, from `@ConfigurationTables`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationTableDefinition {
    pub name: String,
    pub category: String,
    pub description: String,
    pub is_hidden: bool,
    pub is_multi_row: bool,
    pub data_shape_name: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationField {
    pub name: String,
    pub base_type: String,
}

/// Configuration values, from `@config`.
///
/// The column schema is taken from the first row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationTable {
    pub name: String,
    pub description: String,
    pub is_multi_row: bool,
    pub ordinal: u32,
    pub fields: Vec<ConfigurationField>,
    pub rows: Vec<IndexMap<String, LiteralValue>>,
}
