//! Error types for kbgraph.
//!
//! All errors are strongly typed using thiserror so callers can tell a
//! recoverable condition (bad input, a missing entity, a duplicate relation)
//! apart from a fatal store failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityId;
use crate::storage::StorageError;

/// Validation errors raised before any store access.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Malformed interactive or command-line input.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// A merge whose canonical and duplicate are the same entity.
    #[error("Cannot merge entity {id} into itself")]
    SelfMerge {
        /// The entity id given for both sides.
        id: EntityId,
    },

    /// A type string listed under more than one category.
    #[error("Entity type '{entity_type}' is mapped to both '{first}' and '{second}'")]
    OverlappingType {
        /// The ambiguous type string.
        entity_type: String,
        /// Category that listed it first.
        first: String,
        /// Category that listed it again.
        second: String,
    },

    /// A category with an empty name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// A configured category that shadows the fallback bucket.
    #[error("Category name '{name}' is reserved")]
    ReservedCategory {
        /// The reserved name.
        name: String,
    },

    /// An empty type string inside a category.
    #[error("Category '{category}' lists an empty entity type")]
    EmptyType {
        /// Category that contains the empty entry.
        category: String,
    },

    /// A required text field left empty.
    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        /// Name of the field.
        field: String,
    },
}

/// Errors raised while an operation executes.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A referenced entity does not exist.
    #[error("Entity not found: {id}")]
    EntityNotFound {
        /// The missing id.
        id: EntityId,
    },

    /// A filesystem step failed.
    #[error("I/O error at {}: {message}", path.display())]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },

    /// Reading from or writing to the interactive terminal failed.
    #[error("Prompt error: {message}")]
    Prompt {
        /// Underlying error text.
        message: String,
    },
}

impl ExecutionError {
    /// Builds an [`ExecutionError::Io`] from a path and an `io::Error`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Top-level error type for kbgraph.
#[derive(Debug, Error)]
pub enum KbError {
    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An operation failed while executing.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// The store rejected or failed a statement.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A configuration file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong.
        message: String,
    },
}

impl KbError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if a referenced entity was missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Execution(ExecutionError::EntityNotFound { .. })
                | Self::Storage(StorageError::EntityNotFound(_))
        )
    }

    /// Returns true if the store rejected a write on a constraint.
    #[must_use]
    pub const fn is_constraint(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_constraint(),
            _ => false,
        }
    }

    /// Returns true if the error must abort a whole batch rather than one item.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => {
                matches!(e, ExecutionError::Io { .. } | ExecutionError::Prompt { .. })
            }
            Self::Storage(e) => e.is_fatal(),
            Self::Config { .. } => true,
        }
    }
}

/// Result type alias for kbgraph operations.
pub type KbResult<T> = Result<T, KbError>;
