//! Relationship descriptors.

use std::fmt;

/// The closed set of supported relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// The host carries a foreign key pointing at one related record.
    BelongsTo,
    /// Related records carry a foreign key pointing back at the host.
    HasMany,
    /// Host and related records are joined through a pivot table.
    BelongsToMany,
    /// Like `HasMany`, but the child's back-pointer is polymorphic.
    MorphMany,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BelongsTo => "BelongsTo",
            Self::HasMany => "HasMany",
            Self::BelongsToMany => "BelongsToMany",
            Self::MorphMany => "MorphMany",
        };
        write!(f, "{name}")
    }
}

/// Describes one relationship of a record type.
///
/// The foreign key lives on the host for [`RelationKind::BelongsTo`] and
/// on the child for [`RelationKind::HasMany`] / [`RelationKind::MorphMany`].
/// `BelongsToMany` keeps its keys in the store's pivot table and lists the
/// pivot columns in `pivot_attrs`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    name: String,
    kind: RelationKind,
    related_type: String,
    foreign_key: Option<String>,
    morph_type: Option<String>,
    related_key: String,
    pivot_attrs: Vec<String>,
}

impl RelationDescriptor {
    /// Creates a `BelongsTo` descriptor; `foreign_key` is the host field.
    #[must_use]
    pub fn belongs_to(
        name: impl Into<String>,
        related_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::BelongsTo,
            related_type: related_type.into(),
            foreign_key: Some(foreign_key.into()),
            morph_type: None,
            related_key: "id".to_owned(),
            pivot_attrs: Vec::new(),
        }
    }

    /// Creates a `HasMany` descriptor; `foreign_key` is the child field.
    #[must_use]
    pub fn has_many(
        name: impl Into<String>,
        related_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::HasMany,
            related_type: related_type.into(),
            foreign_key: Some(foreign_key.into()),
            morph_type: None,
            related_key: "id".to_owned(),
            pivot_attrs: Vec::new(),
        }
    }

    /// Creates a `MorphMany` descriptor; the child carries both the id
    /// field `foreign_key` and the type field `morph_type`.
    #[must_use]
    pub fn morph_many(
        name: impl Into<String>,
        related_type: impl Into<String>,
        foreign_key: impl Into<String>,
        morph_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::MorphMany,
            related_type: related_type.into(),
            foreign_key: Some(foreign_key.into()),
            morph_type: Some(morph_type.into()),
            related_key: "id".to_owned(),
            pivot_attrs: Vec::new(),
        }
    }

    /// Creates a `BelongsToMany` descriptor with the given pivot columns.
    #[must_use]
    pub fn belongs_to_many<I, S>(
        name: impl Into<String>,
        related_type: impl Into<String>,
        pivot_attrs: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: RelationKind::BelongsToMany,
            related_type: related_type.into(),
            foreign_key: None,
            morph_type: None,
            related_key: "id".to_owned(),
            pivot_attrs: pivot_attrs.into_iter().map(Into::into).collect(),
        }
    }

    /// Overrides the related type's key name (defaults to `id`).
    #[must_use]
    pub fn with_related_key(mut self, related_key: impl Into<String>) -> Self {
        self.related_key = related_key.into();
        self
    }

    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relationship kind.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Returns the related record type name.
    #[must_use]
    pub fn related_type(&self) -> &str {
        &self.related_type
    }

    /// Returns the foreign key field, where the kind has one.
    #[must_use]
    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    /// Returns the polymorphic type field for `MorphMany`.
    #[must_use]
    pub fn morph_type(&self) -> Option<&str> {
        self.morph_type.as_deref()
    }

    /// Returns the related type's key name.
    #[must_use]
    pub fn related_key(&self) -> &str {
        &self.related_key
    }

    /// Returns the pivot column names for `BelongsToMany`.
    #[must_use]
    pub fn pivot_attrs(&self) -> &[String] {
        &self.pivot_attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", RelationKind::BelongsToMany), "BelongsToMany");
    }

    #[test]
    fn belongs_to_carries_host_foreign_key() {
        let rel = RelationDescriptor::belongs_to("country", "country", "country_id");
        assert_eq!(rel.kind(), RelationKind::BelongsTo);
        assert_eq!(rel.foreign_key(), Some("country_id"));
        assert_eq!(rel.related_key(), "id");
    }

    #[test]
    fn belongs_to_many_lists_pivot_attrs() {
        let rel = RelationDescriptor::belongs_to_many("brands", "brand", ["status"]);
        assert_eq!(rel.pivot_attrs(), &["status".to_owned()]);
        assert_eq!(rel.foreign_key(), None);
    }
}
