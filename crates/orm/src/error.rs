//! Error types for the ORM system
//!
//! Lookups that expect a row, invariant violations, identifier validation
//! and driver failures all surface through [`ModelError`]. Driver errors are
//! carried through untouched.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// A lookup that expected exactly one row found none
    #[error("No query results for model [{model}]")]
    NotFound { model: String },

    /// An invariant of the data model was violated
    #[error("{0}")]
    Logic(String),

    /// The primary key of a persisted entity cannot change
    #[error("Primary key of persisted model [{model}] is immutable")]
    ImmutablePrimaryKey { model: String },

    /// Identifier rejected by the wrapper
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Morph discriminator with no registered entity type
    #[error("Unknown morph type '{0}'")]
    UnknownMorphType(String),

    /// Entity type missing from the registry
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    /// Relation missing from the registry
    #[error("Relation '{relation}' is not defined on model [{model}]")]
    UnknownRelation { model: String, relation: String },

    /// Invalid relation definition
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Configuration value failed validation
    #[error("Invalid configuration value for {field}: '{value}' (expected {expected})")]
    InvalidConfig {
        field: String,
        value: String,
        expected: String,
    },

    /// Statement could not be compiled
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error raised by the row-fetch collaborator
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl ModelError {
    pub fn not_found(model: impl Into<String>) -> Self {
        ModelError::NotFound {
            model: model.into(),
        }
    }

    pub fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        ModelError::InvalidConfig {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Whether the error originated in the driver
    pub fn is_driver_error(&self) -> bool {
        matches!(self, ModelError::Driver(_))
    }
}
