//! Handler for `HasMany` and `MorphMany` relationships.

use crate::error::FormResult;
use formstate_store::{FieldMap, Record, RecordId, RecordStore, RelationDescriptor};
use serde_json::Value;
use tracing::debug;

use super::handler::{RelationHandler, Scope};
use super::{fillable_attrs, update_record};

/// Persists one-to-many children: create when no id is active, update
/// the identified child otherwise.
pub(crate) struct HasManyHandler;

impl RelationHandler for HasManyHandler {
    fn save(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: Option<&RecordId>,
        data: FieldMap,
    ) -> FormResult<()> {
        match id {
            None => {
                let attrs = fillable_attrs(scope.store, relation.related_type(), &data)?;
                let created = scope
                    .store
                    .create_related(host, relation, attrs, FieldMap::new())?;
                debug!(relation = relation.name(), id = %created.id().map(ToString::to_string).unwrap_or_default(), "child created");
                scope.buffer.set_active_id(created.id().cloned());
                Ok(())
            }
            Some(id) => {
                let Some(mut child) = scope.store.related_find(host, relation, id)? else {
                    // Child vanished mid-edit; nothing left to update.
                    return Ok(());
                };
                update_record(scope.store, &mut child, &data)
            }
        }
    }

    fn update_field(
        &self,
        _scope: &mut Scope<'_>,
        _host: &mut Record,
        _relation: &RelationDescriptor,
        _target: &Record,
        _real_key: &str,
        _value: &Value,
    ) -> FormResult<bool> {
        // Children have no special fields; the generic set applies.
        Ok(false)
    }

    fn delete(
        &self,
        store: &dyn RecordStore,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> FormResult<()> {
        if let Some(child) = store.related_find(host, relation, id)? {
            store.delete(&child)?;
        }
        Ok(())
    }
}
