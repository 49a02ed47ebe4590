//! Error types for the shuffle database crate.

use thiserror::Error;

/// Why a single rule line was rejected.
///
/// Rule errors are never fatal: the loader logs them and drops the line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("missing ':' between conditions and actions")]
    MissingColon,
    #[error("condition `{0}` has no operator (expected one of ~ = < >)")]
    MissingOperator(String),
    #[error("condition `{0}` has an empty property name")]
    EmptyProperty(String),
    #[error("action `{0}` is not of the form prop=value")]
    BadAction(String),
    #[error("action `{0}` assigns a value property `{1}` cannot hold")]
    BadValue(String, String),
}

/// Errors from the main database writer.
///
/// Every variant is fatal for a rebuild: the database on the device is left
/// in an inconsistent state.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("I/O error while writing the database: {0}")]
    Io(#[from] std::io::Error),
    #[error("too many entries for a 24-bit track count")]
    DatabaseFull,
}

/// Errors from the playback-state, statistics and shuffle-order files.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
