//! # FormState Store
//!
//! Record store adapter for the FormState engine.
//!
//! This crate provides the lowest-level seam of FormState: a typed record
//! store with relationship links. The form-state core never queries a
//! database directly - it goes through the [`RecordStore`] trait.
//!
//! ## Design Principles
//!
//! - Stores expose records as flat attribute maps plus an optional id
//! - Relationship discovery is an explicit probe ([`RecordStore::relation`]
//!   returns `Option`), never exception-based control flow
//! - "Record not found" is `Ok(None)`; "type not registered" is an error
//! - Stores must be `Send + Sync` so sessions can share them via `Arc`
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - for tests and ephemeral sessions
//!
//! ## Example
//!
//! ```rust
//! use formstate_store::{MemoryStore, RecordStore, TypeSchema};
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! store.register_type(TypeSchema::new("country").fillable(["name"]));
//! let country = store.seed("country", [("name", json!("Germany"))]).unwrap();
//! assert_eq!(country.get("name"), Some(&json!("Germany")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod record;
mod relation;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::{EnumCast, EnumVariant, FieldMap, Record, RecordId, TypeSchema};
pub use relation::{RelationDescriptor, RelationKind};
pub use store::RecordStore;
