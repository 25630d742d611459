//! Error types for the policy adapter.
//!
//! This module defines all error types used throughout the adapter, following
//! a hierarchy that separates backend errors, transaction errors, validation
//! errors, model errors and configuration errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all adapter operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific errors (transport, database, serialization)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Transaction state errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Invalid arguments passed to an adapter operation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Errors raised by the in-memory policy model
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invalid adapter configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors originating from the document store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}: {message}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("request to {backend_name} timed out after {timeout_ms}ms")]
    Timeout {
        backend_name: String,
        timeout_ms: u64,
    },

    /// The named database does not exist.
    #[error("database not found: {name}")]
    DatabaseNotFound { name: String },

    /// The named collection does not exist.
    #[error("collection not found: {database}/{name}")]
    CollectionNotFound { database: String, name: String },

    /// The server answered with an error response.
    #[error("{backend_name} request failed with status {status}: {message}")]
    Request {
        backend_name: String,
        status: u16,
        error_num: Option<i64>,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Commit or rollback was attempted on a finished transaction.
    #[error("transaction already finished")]
    AlreadyFinished,

    /// An operation was issued through an adapter whose transaction has ended.
    #[error("transaction no longer valid")]
    InvalidTransaction,

    /// The backend does not know the transaction id.
    #[error("transaction not found: {id}")]
    NotFound { id: String },

    /// Nested transactions not supported.
    #[error("nested transactions not supported")]
    NestedNotSupported,
}

/// Errors related to invalid operation arguments.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Old and new rule lists of a batch update differ in length.
    #[error("update requires matching rule counts (old: {old}, new: {new})")]
    RuleCountMismatch { old: usize, new: usize },
}

/// Errors raised by a [`PolicyModel`](crate::model::PolicyModel).
#[derive(Error, Debug)]
pub enum ModelError {
    /// A policy line was empty.
    #[error("policy line is empty")]
    EmptyLine,

    /// The ptype does not belong to a known section.
    #[error("unknown policy section '{section}' for ptype '{ptype}'")]
    UnknownSection { section: String, ptype: String },
}

/// Errors related to adapter configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No endpoints were configured.
    #[error("at least one endpoint is required")]
    NoEndpoints,

    /// An endpoint could not be parsed.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// A required name was empty.
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    /// The save batch size was zero.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    /// An environment variable held an unparseable value.
    #[error("invalid value '{value}' for {variable}")]
    InvalidValue { variable: String, value: String },

    /// The CA certificate or client identity could not be loaded.
    #[error("failed to load TLS material from {path}: {message}")]
    TlsMaterial { path: String, message: String },

    /// The HTTP client's native TLS backend cannot enforce this minimum
    /// protocol version.
    #[error("minimum TLS version {version} is not supported by the native TLS backend")]
    UnsupportedTlsVersion { version: &'static str },
}

/// Result type alias for adapter operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "arangodb")]
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            return StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "arangodb".to_string(),
                message: err.to_string(),
            });
        }
        if err.is_decode() {
            return StorageError::Backend(BackendError::SerializationError {
                message: err.to_string(),
            });
        }
        StorageError::Backend(BackendError::Internal {
            backend_name: "arangodb".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}
