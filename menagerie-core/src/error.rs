//! Error types and result types for model compilation and query execution.
//!
//! Every fallible operation in the crate returns [`ZooResult<T>`]. Errors raised by
//! the database client are passed through untouched so callers can match on
//! [`ZooError::InstanceNotFound`] or [`ZooError::InstanceNotUnique`] directly.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::schema::ValidationError;

/// Represents all possible errors that can occur when compiling or running queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZooError {
    /// Required configuration (such as the database secret) is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Admitted data did not match its schema. Raised before any request is sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The schema definition was used incorrectly, e.g. a unique lookup on a
    /// field that is not unique.
    #[error("Misuse: {0}")]
    Misuse(String),
    /// The referenced document, collection or index does not exist.
    #[error("instance not found")]
    InstanceNotFound,
    /// A write collided with a unique index.
    #[error("instance not unique")]
    InstanceNotUnique,
    /// A collection or index with the same name already exists.
    #[error("instance already exists")]
    InstanceAlreadyExists,
    /// The client could not evaluate an expression.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    /// Serialization/deserialization error when converting between value formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Any other failure reported by the database client.
    #[error("Client error: {0}")]
    Client(String),
}

/// A specialized `Result` type for model and manager operations.
pub type ZooResult<T> = Result<T, ZooError>;

impl From<BsonError> for ZooError {
    fn from(err: BsonError) -> Self {
        ZooError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ZooError {
    fn from(err: SerdeJsonError) -> Self {
        ZooError::Serialization(err.to_string())
    }
}
