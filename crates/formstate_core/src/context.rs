//! Context switching.
//!
//! Loading a context points the buffer at a record (root or related),
//! fetches it, and replaces the relevant slice of the buffer with the
//! record's rule-filtered attributes. A record that has vanished from
//! the store degrades to an empty slice instead of erroring, so a form
//! never breaks because another actor deleted the row mid-edit.

use crate::buffer::FormBuffer;
use crate::error::FormResult;
use crate::filter::extract_filtered;
use crate::resolver::ModelResolver;
use crate::rules::RuleCatalog;
use formstate_store::{RecordId, RecordStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Switches the buffer between editing contexts.
#[derive(Clone)]
pub struct ContextManager {
    store: Arc<dyn RecordStore>,
    resolver: ModelResolver,
}

impl ContextManager {
    /// Creates a context manager over a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let resolver = ModelResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// Loads `context` into the buffer, targeting the record with `id`.
    ///
    /// `id == None` prepares a blank slice for creating a new record.
    /// The loaded slice replaces previous data for that context; with
    /// `preserve_relations`, nested relation slices already in the
    /// buffer survive a root reload so switching back from a relation
    /// does not discard its unsaved edits.
    ///
    /// A record missing from the store clears the context's slice and
    /// returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors: an uninitialized buffer or a context
    /// path that is not a relationship of its host type.
    pub fn load_context(
        &self,
        buffer: &mut FormBuffer,
        rules: &RuleCatalog,
        context: &str,
        id: Option<&RecordId>,
        preserve_relations: bool,
    ) -> FormResult<()> {
        buffer.set_context(context, id.cloned());

        let Some(record) = self.resolver.resolve(buffer, context, id, false)? else {
            debug!(context, "record not found, clearing context slice");
            if context.is_empty() {
                buffer.clear_data();
            } else {
                let first = context.split('.').next().unwrap_or(context);
                buffer.forget(first);
            }
            return Ok(());
        };

        let key_name = self.store.schema(record.record_type())?.key().to_owned();
        let extracted = extract_filtered(&record, rules, context, &key_name);
        debug!(context, fields = extracted.len(), "context loaded");

        if context.is_empty() {
            let preserved: Vec<(String, Value)> = if preserve_relations {
                rules
                    .relations("")
                    .into_iter()
                    .filter_map(|relation| {
                        buffer
                            .get(&relation)
                            .filter(|value| value.is_object())
                            .map(|value| (relation, value.clone()))
                    })
                    .collect()
            } else {
                Vec::new()
            };

            buffer.clear_data();
            for (key, value) in extracted {
                buffer.put(key, value)?;
            }
            for (relation, slice) in preserved {
                buffer.put(relation, slice)?;
            }
        } else {
            // One relation slice at a time; evict the others.
            let first = context.split('.').next().unwrap_or(context);
            for relation in rules.relations("") {
                if relation != first {
                    buffer.forget(&relation);
                }
            }
            buffer.set_nested(context, Value::Object(extracted))?;
        }

        Ok(())
    }
}
