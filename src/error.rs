use thiserror::Error;

use crate::types::ExecStatus;

/// Errors raised by the connection layer: connect failures, driver-level
/// errors, and the convenience-operation failures built on top of execute.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("connection is not open")]
    NotOpen,

    #[error("database error: {0}")]
    Native(String),

    #[error("identifier contains characters outside [A-Za-z0-9_$]: {0:?}")]
    UnsafeIdentifier(String),

    #[error("statement returned no rows")]
    NoRowReturned,

    #[error("returned primary key could not be converted: {0}")]
    PkConversion(String),
}

/// A completed but unsuccessful server response.
#[derive(Debug, Error)]
pub enum ResultError {
    #[error("query failed with status {status:?}: {message}")]
    BadStatus { status: ExecStatus, message: String },
}

/// Errors from assembling query components.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("template has {placeholders} placeholder(s) but {values} parameter value(s)")]
    PlaceholderMismatch { placeholders: usize, values: usize },
}

/// Errors from parsing a connection URI.
#[derive(Debug, Error)]
pub enum UriError {
    #[error("invalid connection URI: {0}")]
    Invalid(String),

    #[error("connection URI has no host")]
    MissingHost,

    #[error("connection URI has no port")]
    MissingPort,

    #[error("connection URI has no database name")]
    MissingDatabase,
}

/// Umbrella error for operations that can fail at more than one layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type alias for pgbridge operations
pub type Result<T> = std::result::Result<T, Error>;
