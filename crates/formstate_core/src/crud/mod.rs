//! The CRUD processor.
//!
//! Turns buffered form state into store writes. A full `save` always
//! persists the root first (relation edits may imply a foreign-key
//! change there) and then the active relation context, dispatched to a
//! kind-specific handler. The single-field `updated_field` path backs
//! auto-save mode.
//!
//! Staleness is never an error on this layer: a record deleted by
//! another actor between resolve and write turns the write into a no-op.

mod belongs_to;
mod belongs_to_many;
mod handler;
mod has_many;

use crate::buffer::{FormBuffer, SYSTEM_KEY};
use crate::error::{FormError, FormResult};
use crate::filter::{extract_filtered, sanitize};
use crate::path::set_path;
use crate::resolver::ModelResolver;
use crate::rules::RuleCatalog;
use formstate_store::{
    FieldMap, Record, RecordId, RecordStore, RelationDescriptor, RelationKind,
};
use handler::{handler_for, Scope};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a single-field update.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    /// The sanitized value; callers reflect this into the buffer even
    /// when nothing was persisted.
    pub clean_value: Value,
    /// True if the value reached the store.
    pub saved: bool,
    /// The context the field belongs to.
    pub context: String,
    /// The active id at the time of the write; a `BelongsTo` re-target
    /// reports the new target here.
    pub id: Option<RecordId>,
}

/// Persists buffered form state against the record store.
#[derive(Clone)]
pub struct CrudProcessor {
    store: Arc<dyn RecordStore>,
    resolver: ModelResolver,
}

impl CrudProcessor {
    /// Creates a processor over a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let resolver = ModelResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// Persists the buffer: root first, then the active relation context.
    ///
    /// A root that vanished from the store aborts silently; the user has
    /// nothing left to save.
    ///
    /// # Errors
    ///
    /// Propagates store failures and a context path that is not a
    /// relationship chain of the root type.
    pub fn save(&self, buffer: &mut FormBuffer, rules: &RuleCatalog) -> FormResult<()> {
        let root_id = buffer.meta().root_id.clone();
        let Some(mut root) = self.resolver.resolve(buffer, "", root_id.as_ref(), false)? else {
            debug!("root record gone, nothing to save");
            return Ok(());
        };

        self.save_root(buffer, &mut root)?;
        if buffer.meta().root_id.is_none() {
            if buffer.is_root() {
                buffer.set_active_id(root.id().cloned());
            }
            buffer.set_root_model(root.record_type().to_owned(), root.id().cloned());
        }

        let context = buffer.meta().active_context.clone();
        if !context.is_empty() {
            let id = buffer.meta().active_id.clone();
            self.save_related(buffer, rules, &mut root, &context, id.as_ref())?;
        }
        Ok(())
    }

    /// Applies root-level buffer data onto the root and persists it.
    ///
    /// Three passes over the items: foreign keys lifted out of
    /// relation-shaped sub-maps, a best-effort fallback scan of dotted
    /// and relation-named keys (later writes win), then sanitized scalar
    /// fillable fields.
    fn save_root(&self, buffer: &mut FormBuffer, root: &mut Record) -> FormResult<()> {
        let schema = self.store.schema(root.record_type())?;
        let nullables = buffer.meta().nullables.clone();
        let data = buffer.all().clone();

        for (key, value) in &data {
            let Value::Object(nested) = value else {
                continue;
            };
            let Some(relation) = self.store.relation(root.record_type(), key)? else {
                continue;
            };
            if relation.kind() != RelationKind::BelongsTo {
                continue;
            }
            let related_key = self.store.schema(relation.related_type())?.key().to_owned();
            if let Some(id_value) = nested.get(&related_key) {
                if let (Some(fk), false) = (relation.foreign_key(), id_value.is_null()) {
                    root.set(fk.to_owned(), id_value.clone());
                }
            }
        }

        // Fallback discovery: not every caller nests relation data, so
        // dotted and bare relation-named keys get a second look. Keys
        // that turn out not to be relations are skipped, not rejected.
        for (key, value) in &data {
            if value.is_object() || value.is_array() || value.is_null() {
                continue;
            }
            let (name, field) = match key.split_once('.') {
                Some((name, field)) => (name, Some(field)),
                None => (key.as_str(), None),
            };
            let Some(relation) = self.store.relation(root.record_type(), name)? else {
                continue;
            };
            if relation.kind() != RelationKind::BelongsTo {
                continue;
            }
            let related_key = self.store.schema(relation.related_type())?.key().to_owned();
            if field.is_none_or(|field| field == related_key) {
                if let Some(fk) = relation.foreign_key() {
                    root.set(fk.to_owned(), value.clone());
                }
            }
        }

        for (key, value) in &data {
            if key.contains('.') || key == SYSTEM_KEY || value.is_object() || value.is_array() {
                continue;
            }
            if schema.is_fillable(key) {
                root.set(key.clone(), sanitize(key, value.clone(), &nullables));
            }
        }

        self.store.save(root)?;
        debug!(record_type = root.record_type(), id = ?root.id(), "root persisted");
        Ok(())
    }

    /// Persists the data sub-map of a relation context.
    fn save_related(
        &self,
        buffer: &mut FormBuffer,
        rules: &RuleCatalog,
        root: &mut Record,
        context: &str,
        id: Option<&RecordId>,
    ) -> FormResult<()> {
        let nullables = buffer.meta().nullables.clone();
        let mut data = match crate::path::get_path(buffer.all(), context) {
            Some(Value::Object(nested)) => nested.clone(),
            _ => FieldMap::new(),
        };
        if data.is_empty() {
            // Callers may pass flat dot-keys instead of a nested map.
            let prefix = format!("{context}.");
            for (key, value) in buffer.all() {
                if let Some(field) = key.strip_prefix(&prefix) {
                    set_path(&mut data, field, value.clone());
                }
            }
        }
        if data.is_empty() {
            return Ok(());
        }

        let data: FieldMap = data
            .into_iter()
            .map(|(key, value)| {
                let clean = sanitize(&format!("{context}.{key}"), value, &nullables);
                (key, clean)
            })
            .collect();

        let (mut host, relation) = self.relation_scope(root, context)?;
        debug!(context, kind = %relation.kind(), "saving relation context");
        let handler = handler_for(relation.kind());
        let mut scope = Scope {
            store: self.store.as_ref(),
            buffer,
            rules,
            context,
        };
        handler.save(&mut scope, &mut host, &relation, id, data)?;
        if context == relation.name() && host.record_type() == root.record_type() {
            // Single-segment contexts operate on the root itself; keep
            // the caller's copy in sync with handler writes.
            *root = host;
        }
        Ok(())
    }

    /// Persists a single field write (the auto-save path).
    ///
    /// The sanitized value is always reported back; whether it reached
    /// the store depends on the auto-save flag and on the target still
    /// existing. Kind-specific handling (pivot columns, `BelongsTo`
    /// re-targeting) applies only in relation contexts; a context that
    /// turns out not to be a relation falls through to a plain set on
    /// the resolved target.
    ///
    /// # Errors
    ///
    /// Propagates store failures; staleness is reported as
    /// `saved == false`, never as an error.
    pub fn updated_field(
        &self,
        buffer: &mut FormBuffer,
        rules: &RuleCatalog,
        key: &str,
        value: Value,
    ) -> FormResult<FieldUpdate> {
        let nullables = buffer.meta().nullables.clone();
        let clean = sanitize(key, value, &nullables);
        let context = buffer.meta().active_context.clone();
        let id = buffer.meta().active_id.clone();

        if !buffer.meta().auto_save {
            return Ok(FieldUpdate {
                clean_value: clean,
                saved: false,
                context,
                id,
            });
        }

        let root_id = buffer.meta().root_id.clone();
        let Some(root) = self.resolver.resolve(buffer, "", root_id.as_ref(), true)? else {
            return Ok(FieldUpdate {
                clean_value: clean,
                saved: false,
                context,
                id,
            });
        };

        let real_key = match context.is_empty() {
            true => key.to_owned(),
            false => key
                .strip_prefix(&format!("{context}."))
                .unwrap_or(key)
                .to_owned(),
        };

        let mut target = if context.is_empty() {
            root.clone()
        } else {
            match self.resolver.resolve(buffer, &context, id.as_ref(), true)? {
                Some(target) => target,
                None => {
                    return Ok(FieldUpdate {
                        clean_value: clean,
                        saved: false,
                        context,
                        id,
                    })
                }
            }
        };
        if !target.exists() {
            return Ok(FieldUpdate {
                clean_value: clean,
                saved: false,
                context,
                id,
            });
        }

        if !context.is_empty() {
            match self.relation_scope(&root, &context) {
                Ok((mut host, relation)) => {
                    let handler = handler_for(relation.kind());
                    let mut scope = Scope {
                        store: self.store.as_ref(),
                        buffer,
                        rules,
                        context: &context,
                    };
                    if handler.update_field(
                        &mut scope,
                        &mut host,
                        &relation,
                        &target,
                        &real_key,
                        &clean,
                    )? {
                        let id = buffer.meta().active_id.clone();
                        return Ok(FieldUpdate {
                            clean_value: clean,
                            saved: true,
                            context,
                            id,
                        });
                    }
                }
                // Probing a name for relation-ness is speculative; a
                // plain field that merely looks like one falls through.
                Err(FormError::RelationDoesNotExist { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        set_path(target.attrs_mut(), &real_key, clean.clone());
        self.store.save(&mut target)?;
        debug!(key, context, "field persisted");
        Ok(FieldUpdate {
            clean_value: clean,
            saved: true,
            context,
            id,
        })
    }

    /// Removes a record from a relation, or deletes the root itself.
    ///
    /// The buffer is read, never written; callers sequence their own
    /// context reset afterwards.
    ///
    /// # Errors
    ///
    /// Propagates store failures and an unknown relation name.
    pub fn delete(&self, buffer: &FormBuffer, relation: &str, id: &RecordId) -> FormResult<()> {
        if relation.is_empty() {
            let root_type = buffer
                .meta()
                .root_type
                .clone()
                .ok_or(FormError::RootTypeMissing)?;
            if let Some(record) = self.store.find(&root_type, id)? {
                self.store.delete(&record)?;
                debug!(record_type = root_type, %id, "root deleted");
            }
            return Ok(());
        }

        let root_id = buffer.meta().root_id.clone();
        let Some(root) = self.resolver.resolve(buffer, "", root_id.as_ref(), false)? else {
            return Ok(());
        };
        let (mut host, descriptor) = self.relation_scope(&root, relation)?;
        handler_for(descriptor.kind()).delete(self.store.as_ref(), &mut host, &descriptor, id)
    }

    /// Lists a relation's records with only their rule-declared columns.
    ///
    /// An unsaved root or a name that is not a relation yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn relation_list(
        &self,
        buffer: &FormBuffer,
        rules: &RuleCatalog,
        relation: &str,
    ) -> FormResult<Vec<FieldMap>> {
        let root_id = buffer.meta().root_id.clone();
        let Some(root) = self.resolver.resolve(buffer, "", root_id.as_ref(), false)? else {
            return Ok(Vec::new());
        };
        if !root.exists() {
            return Ok(Vec::new());
        }
        let Some(descriptor) = self.store.relation(root.record_type(), relation)? else {
            return Ok(Vec::new());
        };
        let key_name = self.store.schema(descriptor.related_type())?.key().to_owned();
        let records = self.store.related_all(&root, &descriptor)?;
        Ok(records
            .iter()
            .map(|record| extract_filtered(record, rules, relation, &key_name))
            .collect())
    }

    /// Walks a dot-nested context to the host of its final segment.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationDoesNotExist`] when any segment is
    /// not a relationship of its host, or an intermediate link has no
    /// record to traverse through.
    fn relation_scope(
        &self,
        root: &Record,
        context: &str,
    ) -> FormResult<(Record, RelationDescriptor)> {
        let segments: Vec<&str> = context.split('.').collect();
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(FormError::relation_does_not_exist(
                context,
                root.record_type(),
            ));
        };

        let mut host = root.clone();
        for segment in intermediate {
            let relation = self
                .store
                .relation(host.record_type(), segment)?
                .ok_or_else(|| {
                    FormError::relation_does_not_exist(context, host.record_type())
                })?;
            let next = self.store.related_one(&host, &relation)?;
            host = next.ok_or_else(|| {
                FormError::relation_does_not_exist(context, relation.related_type())
            })?;
        }

        let relation = self
            .store
            .relation(host.record_type(), last)?
            .ok_or_else(|| FormError::relation_does_not_exist(context, host.record_type()))?;
        Ok((host, relation))
    }
}

/// Filters a data map down to the scalar, fillable fields of a type.
pub(crate) fn fillable_attrs(
    store: &dyn RecordStore,
    record_type: &str,
    data: &FieldMap,
) -> FormResult<FieldMap> {
    let schema = store.schema(record_type)?;
    Ok(data
        .iter()
        .filter(|(key, value)| {
            schema.is_fillable(key) && !value.is_object() && !value.is_array()
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect())
}

/// Applies fillable fields onto a record and persists it.
///
/// No fillable fields means no write at all.
pub(crate) fn update_record(
    store: &dyn RecordStore,
    record: &mut Record,
    data: &FieldMap,
) -> FormResult<()> {
    let attrs = fillable_attrs(store, record.record_type(), data)?;
    if attrs.is_empty() {
        return Ok(());
    }
    for (key, value) in attrs {
        record.set(key, value);
    }
    store.save(record)?;
    Ok(())
}
