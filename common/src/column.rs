//! Column values and row access for tabular catalog results.

use std::collections::HashMap;

/// A single cell of a catalog result set.
///
/// The warehouse reports every cell as text or SQL `NULL`; `Null` is kept
/// distinct from a missing column so callers can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Text(String),
}

impl ColumnValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(text) => Some(text),
            ColumnValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl From<Option<String>> for ColumnValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => ColumnValue::Text(text),
            None => ColumnValue::Null,
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

/// Provides read-only, case-insensitive access to named columns.
pub trait ColumnContainer {
    /// Returns the backing map keyed by lower-cased column name.
    fn columns(&self) -> &HashMap<String, ColumnValue>;

    /// Fetches a single column by name if present.
    fn column(&self, name: &str) -> Option<&ColumnValue> {
        self.columns().get(&name.to_ascii_lowercase())
    }

    /// Fetches a non-null text cell.
    fn text(&self, name: &str) -> Option<&str> {
        self.column(name).and_then(ColumnValue::as_str)
    }

    /// Fetches the first non-null text cell among several column aliases.
    fn text_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.text(name))
    }
}

/// One row of a catalog result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRow {
    values: HashMap<String, ColumnValue>,
}

impl CatalogRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from parallel column-name and cell slices.
    pub fn from_cells<I, V>(columns: &[String], cells: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ColumnValue>,
    {
        let values = columns
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .zip(cells.into_iter().map(Into::into))
            .collect();
        Self { values }
    }

    pub fn with(mut self, name: &str, value: impl Into<ColumnValue>) -> Self {
        self.values.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

impl ColumnContainer for CatalogRow {
    fn columns(&self) -> &HashMap<String, ColumnValue> {
        &self.values
    }
}
