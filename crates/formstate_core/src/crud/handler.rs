//! Relationship-kind dispatch for CRUD operations.

use crate::buffer::FormBuffer;
use crate::error::FormResult;
use crate::rules::RuleCatalog;
use formstate_store::{FieldMap, Record, RecordId, RecordStore, RelationDescriptor, RelationKind};
use serde_json::Value;

use super::belongs_to::BelongsToHandler;
use super::belongs_to_many::BelongsToManyHandler;
use super::has_many::HasManyHandler;

/// Shared mutable state a handler operates within.
pub(crate) struct Scope<'a> {
    pub store: &'a dyn RecordStore,
    pub buffer: &'a mut FormBuffer,
    pub rules: &'a RuleCatalog,
    /// The relation path being written; empty never reaches a handler.
    pub context: &'a str,
}

/// Kind-specific persistence behavior of a relationship.
///
/// One handler exists per [`RelationKind`] (with `MorphMany` sharing the
/// `HasMany` handler). Handlers are stateless; all state arrives through
/// the [`Scope`] and the explicit host/target records.
pub(crate) trait RelationHandler: Sync {
    /// Persists a context's sanitized data sub-map.
    ///
    /// `id == None` means the context targets a record that does not
    /// exist yet.
    fn save(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: Option<&RecordId>,
        data: FieldMap,
    ) -> FormResult<()>;

    /// Persists a single field write, or declines.
    ///
    /// Returns `Ok(false)` when the field needs no kind-specific
    /// treatment; the caller then force-sets it on the target.
    fn update_field(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        target: &Record,
        real_key: &str,
        value: &Value,
    ) -> FormResult<bool>;

    /// Removes the identified record from the relationship.
    ///
    /// What "remove" means is the kind's call: delete the row, detach
    /// the join entry, or nullify the host's foreign key.
    fn delete(
        &self,
        store: &dyn RecordStore,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> FormResult<()>;
}

/// Resolves the handler for a relationship kind.
pub(crate) fn handler_for(kind: RelationKind) -> &'static dyn RelationHandler {
    match kind {
        RelationKind::BelongsTo => &BelongsToHandler,
        RelationKind::HasMany | RelationKind::MorphMany => &HasManyHandler,
        RelationKind::BelongsToMany => &BelongsToManyHandler,
    }
}
