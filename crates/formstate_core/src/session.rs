//! The editing-session facade.
//!
//! A `FormSession` owns the buffer, the rule catalog, the store handle
//! and the event feed, and exposes the operations a UI binding layer
//! drives: edit/add/cancel, save, delete, single-field updates and
//! option listings. It is the one place the editing state machine lives;
//! the collaborators underneath are stateless over the buffer they are
//! handed.

use crate::buffer::{FormBuffer, SYSTEM_KEY};
use crate::context::ContextManager;
use crate::crud::{CrudProcessor, FieldUpdate};
use crate::error::{FormError, FormResult};
use crate::events::{EventFeed, FormEvent};
use crate::filter::allowed_fields;
use crate::options::{OptionResolver, SelectOption};
use crate::resolver::ModelResolver;
use crate::rules::RuleCatalog;
use formstate_store::{FieldMap, Record, RecordId, RecordStore};
use serde_json::Value;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::debug;

/// One user's editing session over a root record.
pub struct FormSession {
    store: Arc<dyn RecordStore>,
    rules: RuleCatalog,
    buffer: FormBuffer,
    context: ContextManager,
    crud: CrudProcessor,
    resolver: ModelResolver,
    options: OptionResolver,
    events: EventFeed,
}

impl FormSession {
    /// Opens a session on a root record.
    ///
    /// An unsaved root is allowed and means the form starts in create
    /// mode. The root's current attributes are loaded into the buffer
    /// immediately.
    ///
    /// # Errors
    ///
    /// - [`FormError::RootRecordRequired`] when `root` is `None`
    /// - [`FormError::ForbiddenKey`] when the catalog declares the
    ///   reserved metadata key
    pub fn new(
        store: Arc<dyn RecordStore>,
        rules: RuleCatalog,
        root: Option<&Record>,
    ) -> FormResult<Self> {
        let root = root.ok_or(FormError::RootRecordRequired)?;
        if let Some(key) = rules.reserved_key() {
            return Err(FormError::forbidden_key(key));
        }

        let mut buffer = FormBuffer::new();
        buffer.set_root_model(root.record_type().to_owned(), root.id().cloned());
        buffer.set_nullables(rules.nullables());

        let context = ContextManager::new(Arc::clone(&store));
        context.load_context(&mut buffer, &rules, "", root.id(), false)?;

        Ok(Self {
            crud: CrudProcessor::new(Arc::clone(&store)),
            resolver: ModelResolver::new(Arc::clone(&store)),
            options: OptionResolver::new(Arc::clone(&store)),
            context,
            store,
            rules,
            buffer,
            events: EventFeed::new(),
        })
    }

    /// Switches to editing an existing record of a relation, or of the
    /// root itself when `relation` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationNotAllowed`] when the catalog
    /// declares no field of the relation.
    pub fn edit(&mut self, relation: &str, id: &RecordId) -> FormResult<()> {
        self.ensure_relation_allowed(relation)?;
        self.context
            .load_context(&mut self.buffer, &self.rules, relation, Some(id), true)
    }

    /// Switches to creating a new record of a relation. `add("")` resets
    /// the session to a fresh, unsaved root form.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationNotAllowed`] when the catalog
    /// declares no field of the relation.
    pub fn add(&mut self, relation: &str) -> FormResult<()> {
        self.ensure_relation_allowed(relation)?;
        let preserve = !relation.is_empty();
        self.context
            .load_context(&mut self.buffer, &self.rules, relation, None, preserve)
    }

    /// Discards unsaved edits and reloads the root context.
    pub fn cancel(&mut self) -> FormResult<()> {
        let root_id = self.buffer.meta().root_id.clone();
        self.context
            .load_context(&mut self.buffer, &self.rules, "", root_id.as_ref(), false)
    }

    /// Persists the buffer and drops back to the root context.
    ///
    /// # Errors
    ///
    /// Propagates CRUD processor errors.
    pub fn save(&mut self) -> FormResult<()> {
        self.crud.save(&mut self.buffer, &self.rules)?;
        let context = self.buffer.meta().active_context.clone();
        let id = self.buffer.meta().active_id.clone();
        self.events.emit(FormEvent::saved(context, id));
        if !self.buffer.is_root() {
            self.cancel()?;
        }
        Ok(())
    }

    /// Deletes a record: the root itself for an empty relation name,
    /// otherwise the relation's kind decides between delete, detach and
    /// dissociate.
    ///
    /// If the deleted record was the one being edited, the session drops
    /// back to the root context.
    ///
    /// # Errors
    ///
    /// Propagates CRUD processor errors.
    pub fn delete(&mut self, relation: &str, id: &RecordId) -> FormResult<()> {
        self.crud.delete(&self.buffer, relation, id)?;

        if relation.is_empty() {
            if self.buffer.meta().root_id.as_ref() == Some(id) {
                self.add("")?;
            }
        } else if self.is_edited(relation, Some(id)) {
            self.cancel()?;
        }

        self.events
            .emit(FormEvent::saved(relation, Some(id.clone())));
        Ok(())
    }

    /// Handles a single field mutation from the binding layer.
    ///
    /// The sanitized value is reflected into the buffer; with auto-save
    /// enabled it is also persisted and a `FieldUpdated` event fires.
    ///
    /// # Errors
    ///
    /// - [`FormError::ForbiddenKey`] for the reserved metadata key
    /// - [`FormError::FieldNotDeclared`] for a key outside the catalog
    pub fn updated(&mut self, key: &str, value: Value) -> FormResult<FieldUpdate> {
        if key == SYSTEM_KEY || key.starts_with(&format!("{SYSTEM_KEY}.")) {
            return Err(FormError::forbidden_key(key));
        }
        if !self.rules.contains(key) && !allowed_fields(&self.rules, "").contains(&key.to_owned())
        {
            return Err(FormError::field_not_declared(key));
        }

        let update = self
            .crud
            .updated_field(&mut self.buffer, &self.rules, key, value)?;
        self.buffer.set_nested(key, update.clean_value.clone())?;

        if update.saved {
            debug!(key, "field auto-saved");
            self.events.emit(FormEvent::field_updated(
                key,
                update.context.clone(),
                update.id.clone(),
            ));
        }
        Ok(update)
    }

    /// Re-syncs the root context from the store, keeping unsaved
    /// relation slices.
    ///
    /// # Errors
    ///
    /// Propagates context manager errors.
    pub fn reload_model(&mut self, id: &RecordId) -> FormResult<()> {
        self.context
            .load_context(&mut self.buffer, &self.rules, "", Some(id), true)
    }

    /// Resolves the root record with unsaved state applied.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors.
    pub fn model(&self) -> FormResult<Option<Record>> {
        let root_id = self.buffer.meta().root_id.clone();
        self.resolver.resolve(&self.buffer, "", root_id.as_ref(), true)
    }

    /// Resolves the record of the active context with unsaved state
    /// applied.
    ///
    /// # Errors
    ///
    /// Propagates resolver errors.
    pub fn active_model(&self) -> FormResult<Option<Record>> {
        let context = self.buffer.meta().active_context.clone();
        let id = self.buffer.meta().active_id.clone();
        self.resolver.resolve(&self.buffer, &context, id.as_ref(), true)
    }

    /// Returns true while the given relation record is being edited.
    #[must_use]
    pub fn is_edited(&self, relation: &str, id: Option<&RecordId>) -> bool {
        self.buffer.meta().active_context == relation
            && self.buffer.meta().active_id.as_ref() == id
    }

    /// Returns true if deferred (non-auto-save) input is sitting in the
    /// buffer.
    #[must_use]
    pub fn has_unsaved_input(&self) -> bool {
        !self.buffer.meta().auto_save && !self.buffer.all().is_empty()
    }

    /// Toggles auto-save mode.
    pub fn set_auto_save(&mut self, auto_save: bool) {
        self.buffer.set_auto_save(auto_save);
    }

    /// Returns the session buffer.
    #[must_use]
    pub fn buffer(&self) -> &FormBuffer {
        &self.buffer
    }

    /// Returns the rule catalog.
    #[must_use]
    pub fn rules(&self) -> &RuleCatalog {
        &self.rules
    }

    /// Subscribes to the session's event feed.
    pub fn subscribe(&self) -> Receiver<FormEvent> {
        self.events.subscribe()
    }

    /// Lists select options for a relation, labeled by a column.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationNotAllowed`] before any lookup; then
    /// option resolver errors.
    pub fn relation_options(
        &self,
        relation: &str,
        label_column: &str,
    ) -> FormResult<Vec<SelectOption>> {
        self.ensure_relation_allowed(relation)?;
        match self.root_instance()? {
            Some(root) => self.options.relation_options(&root, relation, label_column),
            None => Ok(Vec::new()),
        }
    }

    /// Lists select options for a relation, labeled by a mask.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationNotAllowed`] before any lookup; then
    /// option resolver errors.
    pub fn relation_options_masked(
        &self,
        relation: &str,
        mask: &str,
    ) -> FormResult<Vec<SelectOption>> {
        self.ensure_relation_allowed(relation)?;
        match self.root_instance()? {
            Some(root) => self.options.relation_options_masked(&root, relation, mask),
            None => Ok(Vec::new()),
        }
    }

    /// Lists the variants of an enum-cast attribute of the root type.
    ///
    /// # Errors
    ///
    /// Propagates option resolver errors.
    pub fn enum_options(&self, attribute: &str) -> FormResult<Vec<SelectOption>> {
        let root_type = self
            .buffer
            .meta()
            .root_type
            .clone()
            .ok_or(FormError::RootTypeMissing)?;
        self.options.enum_options(&root_type, attribute)
    }

    /// Lists a relation's records with their rule-declared columns.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::RelationNotAllowed`] before any lookup; then
    /// CRUD processor errors.
    pub fn relation_list(&self, relation: &str) -> FormResult<Vec<FieldMap>> {
        self.ensure_relation_allowed(relation)?;
        self.crud.relation_list(&self.buffer, &self.rules, relation)
    }

    fn root_instance(&self) -> FormResult<Option<Record>> {
        let root_id = self.buffer.meta().root_id.clone();
        self.resolver
            .resolve(&self.buffer, "", root_id.as_ref(), false)
    }

    fn ensure_relation_allowed(&self, relation: &str) -> FormResult<()> {
        if relation.is_empty() || self.rules.allows_relation(relation) {
            Ok(())
        } else {
            Err(FormError::relation_not_allowed(relation))
        }
    }
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("buffer", &self.buffer)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formstate_store::{MemoryStore, RelationDescriptor, TypeSchema};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, RuleCatalog) {
        let store = MemoryStore::new();
        store.register_type(TypeSchema::new("country").fillable(["name"]));
        store.register_type(TypeSchema::new("city").fillable(["name", "country_id"]));
        store.register_relation(
            "city",
            RelationDescriptor::belongs_to("country", "country", "country_id"),
        );
        let rules = RuleCatalog::new()
            .rule("name", "required")
            .rule("country.name", "required");
        (Arc::new(store), rules)
    }

    #[test]
    fn new_requires_a_root_record() {
        let (store, rules) = setup();
        let err = FormSession::new(store as Arc<dyn RecordStore>, rules, None).unwrap_err();
        assert!(matches!(err, FormError::RootRecordRequired));
    }

    #[test]
    fn new_rejects_a_reserved_rule_key() {
        let (store, _) = setup();
        let rules = RuleCatalog::new().rule("__system", "required");
        let root = Record::new("city");
        let err =
            FormSession::new(store as Arc<dyn RecordStore>, rules, Some(&root)).unwrap_err();
        assert!(matches!(err, FormError::ForbiddenKey { .. }));
    }

    #[test]
    fn new_loads_the_root_context() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();
        assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
        assert!(session.buffer().is_root());
    }

    #[test]
    fn edit_guards_undeclared_relations() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();
        let err = session.edit("mayor", &RecordId::Int(1)).unwrap_err();
        assert!(matches!(err, FormError::RelationNotAllowed { .. }));
    }

    #[test]
    fn updated_guards_keys() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();

        let err = session.updated("__system", json!(1)).unwrap_err();
        assert!(matches!(err, FormError::ForbiddenKey { .. }));

        let err = session.updated("undeclared", json!(1)).unwrap_err();
        assert!(matches!(err, FormError::FieldNotDeclared { .. }));

        // The synthesized foreign-key companion is accepted.
        let update = session.updated("country_id", json!(3)).unwrap();
        assert!(!update.saved);
        assert_eq!(session.buffer().get("country_id"), Some(&json!(3)));
    }

    #[test]
    fn deferred_update_is_buffered_not_persisted() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();

        let update = session.updated("name", json!("  Hamburg ")).unwrap();
        assert!(!update.saved);
        assert_eq!(update.clean_value, json!("Hamburg"));
        assert_eq!(session.buffer().get("name"), Some(&json!("Hamburg")));
        assert!(session.has_unsaved_input());

        let stored = store.find("city", city.id().unwrap()).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Berlin")));
    }

    #[test]
    fn cancel_discards_edits() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();
        session.updated("name", json!("Hamburg")).unwrap();
        session.cancel().unwrap();
        assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
    }

    #[test]
    fn save_emits_and_resets_context() {
        let (store, rules) = setup();
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
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();
        let events = session.subscribe();

        session.edit("country", germany.id().unwrap()).unwrap();
        session
            .updated("country.name", json!("Deutschland"))
            .unwrap();
        session.save().unwrap();

        let saved = store.find("country", germany.id().unwrap()).unwrap().unwrap();
        assert_eq!(saved.get("name"), Some(&json!("Deutschland")));
        assert!(session.buffer().is_root());
        assert!(matches!(
            events.recv().unwrap(),
            FormEvent::Saved { .. }
        ));
    }

    #[test]
    fn delete_of_the_active_root_resets_to_a_fresh_form() {
        let (store, rules) = setup();
        let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
        let id = city.id().unwrap().clone();
        let mut session =
            FormSession::new(Arc::clone(&store) as Arc<dyn RecordStore>, rules, Some(&city))
                .unwrap();

        session.delete("", &id).unwrap();
        assert_eq!(store.count("city").unwrap(), 0);
        assert_eq!(session.buffer().meta().root_id, None);
        assert!(session.buffer().all().is_empty());
    }
}
