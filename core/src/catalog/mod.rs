use std::future::Future;

use common::column::CatalogRow;
use thiserror::Error;

use crate::statement::ParseError;

pub mod memory;
pub mod snowflake;

pub use memory::InMemoryCatalog;
pub use snowflake::{SnowflakeCatalog, SnowflakeSettings, TokenType};

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors produced by catalog clients.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("statement '{statement}' failed ({code}): {message}")]
    Statement {
        statement: String,
        code: String,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl CatalogError {
    /// Short stable label for failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Transport(_) => "transport",
            CatalogError::Api { .. } => "api",
            CatalogError::Statement { .. } => "statement",
            CatalogError::Decode(_) => "decode",
            CatalogError::Connect(_) => "connect",
            CatalogError::Parse(_) => "parse",
            CatalogError::Unsupported(_) => "unsupported",
            CatalogError::LockPoisoned(_) => "lock",
        }
    }
}

/// Column-named rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<CatalogRow>,
}

impl TabularResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result from column names and rows of nullable text cells.
    pub fn from_cells(columns: Vec<String>, data: Vec<Vec<Option<String>>>) -> Self {
        let rows = data
            .into_iter()
            .map(|cells| CatalogRow::from_cells(&columns, cells))
            .collect();
        Self { columns, rows }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<CatalogRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CatalogRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes catalog-introspection and DDL statements against the warehouse.
///
/// Implementations hold one session for the whole run and must be safe to
/// share across the worker pool.
pub trait CatalogClient: Send + Sync {
    fn run(&self, statement: &str) -> impl Future<Output = CatalogResult<TabularResult>> + Send;
}

#[cfg(test)]
mod tests {
    use common::column::ColumnContainer;

    use super::*;

    #[test]
    fn tabular_result_maps_cells_by_column() {
        let result = TabularResult::from_cells(
            vec!["name".into(), "kind".into()],
            vec![
                vec![Some("SALES".into()), Some("STANDARD".into())],
                vec![Some("SHARED".into()), None],
            ],
        );

        assert_eq!(result.len(), 2);
        assert_eq!(result.rows()[0].text("kind"), Some("STANDARD"));
        assert!(result.rows()[1].text("kind").is_none());
    }

    #[test]
    fn error_kind_labels_are_stable() {
        let err = CatalogError::Statement {
            statement: "REVOKE".into(),
            code: "003001".into(),
            message: "Insufficient privileges".into(),
        };
        assert_eq!(err.kind(), "statement");
        assert_eq!(CatalogError::Connect("role".into()).kind(), "connect");
    }
}
