use std::io;

use privreset_core::{CatalogError, ReconcileError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("logger initialization failed: {0}")]
    Logger(String),
    #[error("warehouse error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

pub type Result<T> = std::result::Result<T, AppError>;
