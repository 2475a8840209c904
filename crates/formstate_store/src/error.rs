//! Error types for record store operations.

use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record type is not registered with the store.
    #[error("unknown record type: {name}")]
    UnknownType {
        /// Name of the record type.
        name: String,
    },

    /// An operation required a persisted record but got an unsaved one.
    #[error("record of type '{record_type}' has no id yet")]
    UnsavedRecord {
        /// Type of the unsaved record.
        record_type: String,
    },

    /// A relation descriptor is misconfigured for the requested operation.
    #[error("relation '{relation}' is misconfigured: {message}")]
    InvalidRelation {
        /// Name of the relation.
        relation: String,
        /// Description of the misconfiguration.
        message: String,
    },
}

impl StoreError {
    /// Creates an unknown type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates an unsaved record error.
    pub fn unsaved_record(record_type: impl Into<String>) -> Self {
        Self::UnsavedRecord {
            record_type: record_type.into(),
        }
    }

    /// Creates an invalid relation error.
    pub fn invalid_relation(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRelation {
            relation: relation.into(),
            message: message.into(),
        }
    }
}
