//! Handler for `BelongsTo` relationships.
//!
//! The host owns the foreign key, so "editing" this relation has a dual
//! nature: writing the related record's own key field re-targets the
//! link to a different existing record (and persists the host's foreign
//! key immediately), while any other field is an edit of the related
//! record itself.

use crate::error::FormResult;
use crate::filter::extract_filtered;
use formstate_store::{FieldMap, Record, RecordId, RecordStore, RelationDescriptor};
use serde_json::Value;
use tracing::debug;

use super::handler::{RelationHandler, Scope};
use super::update_record;

pub(crate) struct BelongsToHandler;

impl BelongsToHandler {
    /// Points the host's foreign key at `target` and persists the host.
    fn retarget(
        store: &dyn RecordStore,
        host: &mut Record,
        relation: &RelationDescriptor,
        target_id: &RecordId,
    ) -> FormResult<()> {
        if let Some(fk) = relation.foreign_key() {
            debug!(relation = relation.name(), target = %target_id, "foreign key re-targeted");
            host.set(fk.to_owned(), target_id.to_value());
            store.save(host)?;
        }
        Ok(())
    }
}

impl RelationHandler for BelongsToHandler {
    fn save(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: Option<&RecordId>,
        mut data: FieldMap,
    ) -> FormResult<()> {
        let key_name = scope.store.schema(relation.related_type())?.key().to_owned();
        let new_id = data
            .get(&key_name)
            .and_then(RecordId::from_value);

        let mut target = match new_id {
            Some(new_id) if id != Some(&new_id) => {
                let Some(target) = scope.store.find(relation.related_type(), &new_id)? else {
                    return Ok(());
                };
                Self::retarget(scope.store, host, relation, &new_id)?;
                scope.buffer.set_active_id(Some(new_id));
                target
            }
            _ => {
                let Some(id) = id else {
                    // No current target and none selected; nothing to write.
                    return Ok(());
                };
                match scope.store.related_find(host, relation, id)? {
                    Some(target) => target,
                    None => return Ok(()),
                }
            }
        };

        data.shift_remove(&key_name);
        if data.is_empty() {
            return Ok(());
        }
        update_record(scope.store, &mut target, &data)
    }

    fn update_field(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        _target: &Record,
        real_key: &str,
        value: &Value,
    ) -> FormResult<bool> {
        let key_name = scope.store.schema(relation.related_type())?.key().to_owned();
        if real_key != key_name {
            return Ok(false);
        }
        let Some(new_id) = RecordId::from_value(value) else {
            return Ok(false);
        };
        let Some(target) = scope.store.find(relation.related_type(), &new_id)? else {
            // Selected record vanished; swallow rather than corrupt the key.
            return Ok(true);
        };

        Self::retarget(scope.store, host, relation, &new_id)?;
        scope.buffer.set_active_id(Some(new_id));

        // The buffered slice still shows the old target; refresh it.
        let snapshot = extract_filtered(&target, scope.rules, scope.context, &key_name);
        scope
            .buffer
            .set_nested(scope.context, Value::Object(snapshot))?;
        Ok(true)
    }

    fn delete(
        &self,
        store: &dyn RecordStore,
        host: &mut Record,
        relation: &RelationDescriptor,
        _id: &RecordId,
    ) -> FormResult<()> {
        // Dissociate: the related record itself is left alone.
        if let Some(fk) = relation.foreign_key() {
            host.set(fk.to_owned(), Value::Null);
            store.save(host)?;
        }
        Ok(())
    }
}
