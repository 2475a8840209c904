//! Error types for the form-state core.

use thiserror::Error;

/// Result type for form-state operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors that can occur in form-state operations.
///
/// These are developer-facing configuration errors. Transient data races
/// (a record deleted by another actor mid-edit) never surface here; the
/// core degrades those to no-ops by design.
#[derive(Debug, Error)]
pub enum FormError {
    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] formstate_store::StoreError),

    /// Buffer wire (de)serialization error.
    #[error("wire format error: {0}")]
    Wire(#[from] serde_json::Error),

    /// The buffer has no root record type configured.
    #[error("root record type is missing; the session was not initialized")]
    RootTypeMissing,

    /// Initialization was attempted without a root record.
    #[error("a valid root record is required")]
    RootRecordRequired,

    /// The relation has no corresponding rule catalog entry.
    #[error("relation '{relation}' is not declared in the rule catalog")]
    RelationNotAllowed {
        /// Name of the relation.
        relation: String,
    },

    /// The relation name is not a relationship of the host type.
    #[error("relation '{relation}' does not exist on '{host_type}'")]
    RelationDoesNotExist {
        /// The relation path that failed to resolve.
        relation: String,
        /// The record type it was resolved against.
        host_type: String,
    },

    /// A mutation targeted a field absent from the rule catalog.
    #[error("field '{key}' is not declared in the rule catalog")]
    FieldNotDeclared {
        /// The offending field key.
        key: String,
    },

    /// The reserved metadata key was used as an ordinary field.
    #[error("the key '{key}' is reserved for internal use")]
    ForbiddenKey {
        /// The offending key.
        key: String,
    },

    /// An operation required a different relationship kind.
    #[error("relation '{relation}' is of kind {kind} which is not supported here")]
    InvalidRelationKind {
        /// Name of the relation.
        relation: String,
        /// The kind that was found.
        kind: formstate_store::RelationKind,
    },

    /// An attribute was expected to carry an enum cast but has none.
    #[error("attribute '{attribute}' on '{record_type}' has no enum cast")]
    MissingEnumCast {
        /// The record type inspected.
        record_type: String,
        /// The attribute without a cast.
        attribute: String,
    },

    /// An options label mask contains no usable token.
    #[error("invalid options mask: '{mask}' must contain a '(field)' token")]
    OptionMaskSyntax {
        /// The offending mask.
        mask: String,
    },
}

impl FormError {
    /// Creates a relation-not-allowed error.
    pub fn relation_not_allowed(relation: impl Into<String>) -> Self {
        Self::RelationNotAllowed {
            relation: relation.into(),
        }
    }

    /// Creates a relation-does-not-exist error.
    pub fn relation_does_not_exist(
        relation: impl Into<String>,
        host_type: impl Into<String>,
    ) -> Self {
        Self::RelationDoesNotExist {
            relation: relation.into(),
            host_type: host_type.into(),
        }
    }

    /// Creates a field-not-declared error.
    pub fn field_not_declared(key: impl Into<String>) -> Self {
        Self::FieldNotDeclared { key: key.into() }
    }

    /// Creates a forbidden-key error.
    pub fn forbidden_key(key: impl Into<String>) -> Self {
        Self::ForbiddenKey { key: key.into() }
    }

    /// Creates an invalid-relation-kind error.
    pub fn invalid_relation_kind(
        relation: impl Into<String>,
        kind: formstate_store::RelationKind,
    ) -> Self {
        Self::InvalidRelationKind {
            relation: relation.into(),
            kind,
        }
    }

    /// Creates a missing-enum-cast error.
    pub fn missing_enum_cast(
        record_type: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::MissingEnumCast {
            record_type: record_type.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an option-mask-syntax error.
    pub fn option_mask_syntax(mask: impl Into<String>) -> Self {
        Self::OptionMaskSyntax { mask: mask.into() }
    }
}
