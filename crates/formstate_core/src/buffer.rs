//! The form-state buffer.
//!
//! A single mutable staging structure holding unsaved field values plus
//! session metadata (the "single buffer" pattern). Top-level keys are
//! root-record fields; a key matching the active relation name holds a
//! nested map of that relation's fields, including its own nested
//! `pivot` map for many-to-many join attributes. Exactly one context is
//! active at a time; only one relation's data occupies the buffer
//! alongside root fields.

use crate::error::{FormError, FormResult};
use crate::path::{get_path, set_path};
use formstate_store::{FieldMap, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reserved key under which metadata travels in the wire format.
///
/// It must never appear as an ordinary field name; any attempt to use it
/// as one fails fast with [`FormError::ForbiddenKey`].
pub const SYSTEM_KEY: &str = "__system";

/// Session metadata carried alongside the buffered items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferMeta {
    /// The relation path currently being edited; empty means the root.
    pub active_context: String,
    /// Id of the record being edited within the active context; `None`
    /// means a new, unsaved record.
    pub active_id: Option<RecordId>,
    /// Record type of the root.
    pub root_type: Option<String>,
    /// Id of the root record.
    pub root_id: Option<RecordId>,
    /// Field paths whose empty-string input is coerced to null.
    pub nullables: Vec<String>,
    /// When true, every field mutation is persisted immediately.
    pub auto_save: bool,
}

/// The central mutable buffer of an editing session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormBuffer {
    meta: BufferMeta,
    items: FieldMap,
}

impl FormBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata bag.
    #[must_use]
    pub fn meta(&self) -> &BufferMeta {
        &self.meta
    }

    /// Returns all buffered items.
    #[must_use]
    pub fn all(&self) -> &FieldMap {
        &self.items
    }

    /// Reads an item by its top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    /// Returns true if a top-level key is buffered.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Reads an item at a dot path.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        get_path(&self.items, path)
    }

    /// Writes an item at a top-level key.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ForbiddenKey`] for the reserved metadata key;
    /// the buffer is left unchanged.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> FormResult<()> {
        let key = key.into();
        if key == SYSTEM_KEY {
            return Err(FormError::forbidden_key(key));
        }
        self.items.insert(key, value);
        Ok(())
    }

    /// Removes a top-level key.
    pub fn forget(&mut self, key: &str) {
        self.items.shift_remove(key);
    }

    /// Writes a value at a dot path, materializing intermediate maps.
    ///
    /// A non-map value at an intermediate key is coerced to an empty map
    /// before descending.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ForbiddenKey`] when the path's first segment
    /// is the reserved metadata key.
    pub fn set_nested(&mut self, path: &str, value: Value) -> FormResult<()> {
        match path.split_once('.') {
            None => self.put(path, value),
            Some((first, _)) => {
                if first == SYSTEM_KEY {
                    return Err(FormError::forbidden_key(path));
                }
                set_path(&mut self.items, path, value);
                Ok(())
            }
        }
    }

    /// Wipes all items; metadata is retained.
    pub fn clear_data(&mut self) {
        self.items.clear();
    }

    /// Switches the active context and id.
    ///
    /// Switching to the root context also re-targets the root id, so
    /// `set_context("", None)` genuinely forgets the previous record.
    pub fn set_context(&mut self, context: impl Into<String>, id: Option<RecordId>) {
        self.meta.active_context = context.into();
        self.meta.active_id = id.clone();
        if self.meta.active_context.is_empty() {
            self.meta.root_id = id;
        }
    }

    /// Sets the root record identity.
    pub fn set_root_model(&mut self, record_type: impl Into<String>, id: Option<RecordId>) {
        self.meta.root_type = Some(record_type.into());
        self.meta.root_id = id;
    }

    /// Re-targets the active id without switching context.
    pub fn set_active_id(&mut self, id: Option<RecordId>) {
        self.meta.active_id = id;
    }

    /// Replaces the nullable-field set.
    pub fn set_nullables(&mut self, nullables: Vec<String>) {
        self.meta.nullables = nullables;
    }

    /// Toggles auto-save mode.
    pub fn set_auto_save(&mut self, auto_save: bool) {
        self.meta.auto_save = auto_save;
    }

    /// Returns true while the root record is being edited.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.meta.active_context.is_empty()
    }

    /// Serializes the buffer into a single map for transport.
    ///
    /// Ordinary items coexist with one reserved key holding the metadata
    /// bag.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata bag cannot be serialized.
    pub fn to_wire(&self) -> FormResult<FieldMap> {
        let mut wire = self.items.clone();
        wire.insert(SYSTEM_KEY.to_owned(), serde_json::to_value(&self.meta)?);
        Ok(wire)
    }

    /// Reconstructs a buffer from its wire form.
    ///
    /// The reserved key is stripped from the item set; a missing
    /// metadata bag yields default metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata bag is malformed.
    pub fn from_wire(mut wire: FieldMap) -> FormResult<Self> {
        let meta = match wire.shift_remove(SYSTEM_KEY) {
            Some(bag) => serde_json::from_value(bag)?,
            None => BufferMeta::default(),
        };
        Ok(Self { meta, items: wire })
    }
}
