use crate::hasher::HashKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Threshold {threshold} for {kind} must be below the code width ({width} bits)")]
    InvalidThreshold {
        kind: HashKind,
        threshold: u32,
        width: u32,
    },

    #[error("Conflicting declared {kind} widths: {widths:?}")]
    InconsistentWidth { kind: HashKind, widths: Vec<u32> },

    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("Unknown hash kind '{0}'")]
    UnknownHashKind(String),

    #[error("{0}")]
    Other(String),
}
