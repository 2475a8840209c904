//! Record store trait definition.

use crate::error::StoreResult;
use crate::record::{FieldMap, Record, RecordId, TypeSchema};
use crate::relation::RelationDescriptor;

/// The persistence seam of the form-state engine.
///
/// A record store exposes typed entities, their schemas and their
/// relationship links. The form-state core never talks to a database
/// directly; everything goes through this trait.
///
/// # Invariants
///
/// - `find` returns `Ok(None)` for a missing record; "not found" is never
///   an error (the core relies on this to degrade gracefully when a
///   record is deleted by another actor mid-edit)
/// - `relation` returns `Ok(None)` when the name is not a relationship of
///   the type; this is distinguishable from an unknown type, which is an
///   error
/// - `save` refreshes the passed record in place so callers observe
///   store-computed values (assigned ids, defaults) after it returns
/// - `delete` and `detach` are idempotent
///
/// # Implementors
///
/// - [`super::MemoryStore`] - in-memory store for tests and ephemeral
///   sessions
pub trait RecordStore: Send + Sync {
    /// Returns the schema of a record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn schema(&self, record_type: &str) -> StoreResult<TypeSchema>;

    /// Finds a record by type and id.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered. A missing record
    /// is `Ok(None)`.
    fn find(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Record>>;

    /// Creates a fresh unsaved instance of a record type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn new_instance(&self, record_type: &str) -> StoreResult<Record>;

    /// Persists a record (insert or update) and refreshes it in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn save(&self, record: &mut Record) -> StoreResult<()>;

    /// Deletes a record. A record that is already gone is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn delete(&self, record: &Record) -> StoreResult<()>;

    /// Looks up a relationship of a record type by name.
    ///
    /// Returns `Ok(None)` when the name is not a relationship. This is
    /// the explicit probe callers use instead of speculative dispatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn relation(&self, record_type: &str, name: &str) -> StoreResult<Option<RelationDescriptor>>;

    /// Finds a related record by id, scoped to the relationship.
    ///
    /// A record that exists but is not linked to `host` through
    /// `relation` is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the related type is not registered.
    fn related_find(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> StoreResult<Option<Record>>;

    /// Dereferences a single-valued relationship (`BelongsTo`).
    ///
    /// Multi-valued kinds return `Ok(None)`; there is no single record to
    /// traverse through.
    ///
    /// # Errors
    ///
    /// Returns an error if the related type is not registered.
    fn related_one(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Option<Record>>;

    /// Lists all records linked to `host` through `relation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the related type is not registered.
    fn related_all(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Vec<Record>>;

    /// Creates a new related record attached to `host`.
    ///
    /// For `HasMany`/`MorphMany` the store sets the child's back-pointer
    /// fields; for `BelongsToMany` it also writes a pivot row from
    /// `pivot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unsaved or the related type is not
    /// registered.
    fn create_related(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        attrs: FieldMap,
        pivot: FieldMap,
    ) -> StoreResult<Record>;

    /// Attaches an existing record to a `BelongsToMany` relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is unsaved or the relation is not a
    /// `BelongsToMany`.
    fn attach(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
        pivot: FieldMap,
    ) -> StoreResult<()>;

    /// Detaches a record from a `BelongsToMany` relationship.
    ///
    /// Detaching an id that is not attached is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the relation is not a `BelongsToMany`.
    fn detach(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> StoreResult<()>;

    /// Updates pivot columns on an existing `BelongsToMany` join row.
    ///
    /// A join row that does not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the relation is not a `BelongsToMany`.
    fn update_pivot(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
        pivot: FieldMap,
    ) -> StoreResult<()>;

    /// Lists every record of a type, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    fn list_all(&self, record_type: &str) -> StoreResult<Vec<Record>>;
}
