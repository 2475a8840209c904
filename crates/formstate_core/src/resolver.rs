//! Model resolution.
//!
//! Re-hydrates a record for a given context (root or relation path),
//! optionally overlaying the buffer's unsaved values onto the freshly
//! fetched instance before relationship traversal.

use crate::buffer::FormBuffer;
use crate::error::{FormError, FormResult};
use crate::path::get_path;
use formstate_store::{Record, RecordId, RecordStore, RelationKind};
use serde_json::Value;
use std::sync::Arc;

/// Resolves record instances from the store for a buffer's contexts.
#[derive(Clone)]
pub struct ModelResolver {
    store: Arc<dyn RecordStore>,
}

impl ModelResolver {
    /// Creates a resolver over a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Resolves the record for `context`.
    ///
    /// For the root context (`""`) the explicit `id` selects the record;
    /// `None` synthesizes a fresh unsaved instance. For a relation path
    /// the root is fetched by the buffer's root id and the path is walked
    /// segment by segment; `id == None` on the final segment synthesizes
    /// a fresh unsaved related instance.
    ///
    /// Unsaved buffer state is overlaid onto the result when
    /// `apply_state` is true. State is always applied to the root when
    /// traversing through it, regardless of the flag, because foreign
    /// keys must reflect unsaved edits to find the correct related
    /// record.
    ///
    /// # Errors
    ///
    /// - [`FormError::RootTypeMissing`] when the buffer has no root type
    /// - [`FormError::RelationDoesNotExist`] when a path segment is not a
    ///   relationship of its host type
    ///
    /// A requested record that is missing from the store resolves to
    /// `Ok(None)`, as does an intermediate path segment with no related
    /// record attached yet.
    pub fn resolve(
        &self,
        buffer: &FormBuffer,
        context: &str,
        id: Option<&RecordId>,
        apply_state: bool,
    ) -> FormResult<Option<Record>> {
        let root_type = buffer
            .meta()
            .root_type
            .clone()
            .ok_or(FormError::RootTypeMissing)?;

        let target_id = if context.is_empty() {
            id.cloned()
        } else {
            buffer.meta().root_id.clone()
        };

        let mut root = match &target_id {
            Some(target) => match self.store.find(&root_type, target)? {
                Some(record) => record,
                None => return Ok(None),
            },
            None => {
                if !context.is_empty() {
                    // No persisted root to traverse relations from.
                    return Ok(None);
                }
                self.store.new_instance(&root_type)?
            }
        };

        // State always applies to the root when a relation is resolved
        // through it; the flag only governs the root itself.
        if apply_state || !context.is_empty() {
            self.overlay(&mut root, buffer.all())?;
        }

        if context.is_empty() {
            return Ok(Some(root));
        }

        let segments: Vec<&str> = context.split('.').collect();
        let mut current = root;
        for (index, segment) in segments.iter().enumerate() {
            let relation = self
                .store
                .relation(current.record_type(), segment)?
                .ok_or_else(|| {
                    FormError::relation_does_not_exist(context, current.record_type())
                })?;

            if index + 1 == segments.len() {
                let mut target = match id {
                    Some(id) => match self.store.related_find(&current, &relation, id)? {
                        Some(record) => record,
                        None => return Ok(None),
                    },
                    None => self.store.new_instance(relation.related_type())?,
                };
                if apply_state {
                    if let Some(Value::Object(context_data)) = get_path(buffer.all(), context) {
                        let context_data = context_data.clone();
                        self.overlay_map(&mut target, &context_data)?;
                    }
                }
                return Ok(Some(target));
            }

            // Only a single-valued link yields a record to traverse
            // through; anything else means "no related record yet".
            if relation.kind() != RelationKind::BelongsTo {
                return Ok(None);
            }
            current = match self.store.related_one(&current, &relation)? {
                Some(next) => next,
                None => return Ok(None),
            };
        }

        Ok(None)
    }

    /// Overlays scalar, fillable buffer items onto the root instance.
    fn overlay(&self, record: &mut Record, items: &formstate_store::FieldMap) -> FormResult<()> {
        self.overlay_map(record, items)
    }

    fn overlay_map(
        &self,
        record: &mut Record,
        data: &formstate_store::FieldMap,
    ) -> FormResult<()> {
        let schema = self.store.schema(record.record_type())?;
        for (key, value) in data {
            if value.is_object() || value.is_array() {
                continue;
            }
            if schema.is_fillable(key) {
                record.set(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formstate_store::{MemoryStore, RelationDescriptor, TypeSchema};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, FormBuffer) {
        let store = MemoryStore::new();
        store.register_type(TypeSchema::new("country").fillable(["name"]));
        store.register_type(TypeSchema::new("city").fillable(["name", "country_id"]));
        store.register_relation(
            "city",
            RelationDescriptor::belongs_to("country", "country", "country_id"),
        );
        (Arc::new(store), FormBuffer::new())
    }

    #[test]
    fn missing_root_type_is_fatal() {
        let (store, buffer) = setup();
        let resolver = ModelResolver::new(store);
        let err = resolver.resolve(&buffer, "", None, true).unwrap_err();
        assert!(matches!(err, FormError::RootTypeMissing));
    }

    #[test]
    fn root_with_no_id_is_a_fresh_instance() {
        let (store, mut buffer) = setup();
        buffer.set_root_model("city", None);
        let resolver = ModelResolver::new(store);
        let record = resolver.resolve(&buffer, "", None, true).unwrap().unwrap();
        assert!(!record.exists());
        assert_eq!(record.record_type(), "city");
    }

    #[test]
    fn missing_root_record_is_none() {
        let (store, mut buffer) = setup();
        buffer.set_root_model("city", Some(RecordId::Int(9)));
        let resolver = ModelResolver::new(store);
        let result = resolver
            .resolve(&buffer, "", Some(&RecordId::Int(9)), true)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn apply_state_overlays_scalar_fillable_items() {
        let (store, mut buffer) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        buffer.set_root_model("city", city.id().cloned());
        buffer.put("name", json!("Hamburg")).unwrap();
        buffer.put("country", json!({"name": "Germany"})).unwrap();

        let resolver = ModelResolver::new(store);
        let with_state = resolver
            .resolve(&buffer, "", city.id(), true)
            .unwrap()
            .unwrap();
        assert_eq!(with_state.get("name"), Some(&json!("Hamburg")));
        assert!(with_state.get("country").is_none(), "maps are not overlaid");

        let without_state = resolver
            .resolve(&buffer, "", city.id(), false)
            .unwrap()
            .unwrap();
        assert_eq!(without_state.get("name"), Some(&json!("Berlin")));
    }

    #[test]
    fn relation_resolution_honors_unsaved_foreign_key() {
        let (store, mut buffer) = setup();
        let germany = store.seed("country", [("name", json!("Germany"))]).unwrap();
        let france = store.seed("country", [("name", json!("France"))]).unwrap();
        let city = store
            .seed(
                "city",
                [
                    ("name", json!("Berlin")),
                    ("country_id", germany.id().unwrap().to_value()),
                ],
            )
            .unwrap();
        let mut expected = FormBuffer::new();
        expected.set_root_model("city", city.id().cloned());
        // Unsaved retarget: the buffer points the foreign key at France.
        expected
            .put("country_id", france.id().unwrap().to_value())
            .unwrap();
        buffer = expected;

        let resolver = ModelResolver::new(store);
        let related = resolver
            .resolve(&buffer, "country", france.id(), false)
            .unwrap()
            .unwrap();
        assert_eq!(related.get("name"), Some(&json!("France")));
    }

    #[test]
    fn unknown_relation_segment_is_a_hard_error() {
        let (store, mut buffer) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        buffer.set_root_model("city", city.id().cloned());
        let resolver = ModelResolver::new(store);
        let err = resolver
            .resolve(&buffer, "mayor", Some(&RecordId::Int(1)), true)
            .unwrap_err();
        assert!(matches!(err, FormError::RelationDoesNotExist { .. }));
    }

    #[test]
    fn final_segment_without_id_is_a_fresh_related_instance() {
        let (store, mut buffer) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        buffer.set_root_model("city", city.id().cloned());
        let resolver = ModelResolver::new(store);
        let record = resolver
            .resolve(&buffer, "country", None, true)
            .unwrap()
            .unwrap();
        assert!(!record.exists());
        assert_eq!(record.record_type(), "country");
    }

    #[test]
    fn nested_overlay_applies_to_related_record() {
        let (store, mut buffer) = setup();
        let germany = store.seed("country", [("name", json!("Germany"))]).unwrap();
        let city = store
            .seed(
                "city",
                [
                    ("name", json!("Berlin")),
                    ("country_id", germany.id().unwrap().to_value()),
                ],
            )
            .unwrap();
        buffer.set_root_model("city", city.id().cloned());
        buffer
            .put("country", json!({"name": "Deutschland"}))
            .unwrap();

        let resolver = ModelResolver::new(store);
        let related = resolver
            .resolve(&buffer, "country", germany.id(), true)
            .unwrap()
            .unwrap();
        assert_eq!(related.get("name"), Some(&json!("Deutschland")));
    }
}
