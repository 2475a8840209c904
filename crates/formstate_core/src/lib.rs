//! # FormState Core
//!
//! Form-state management between a UI binding layer and a record store:
//! a single staging buffer, rule-driven field filtering, context
//! switching between the root record and its relations, and a CRUD
//! processor that dispatches writes by relationship kind.
//!
//! ## Design Principles
//!
//! - One buffer per session: root fields at the top level, the active
//!   relation's data nested under its name, metadata under a reserved key
//! - The rule catalog is the access-control list: undeclared fields never
//!   enter the buffer or reach the store
//! - Staleness degrades, configuration errors raise: a record deleted by
//!   another actor turns writes into no-ops, while a missing rule or
//!   disallowed relation fails fast
//! - The buffer travels explicitly through every collaborator; there is
//!   no ambient shared state
//!
//! ## Example
//!
//! ```rust
//! use formstate_core::{FormSession, RuleCatalog};
//! use formstate_store::{MemoryStore, TypeSchema};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.register_type(TypeSchema::new("city").fillable(["name"]));
//! let city = store.seed("city", [("name", json!("Berlin"))]).unwrap();
//!
//! let rules = RuleCatalog::new().rule("name", "required");
//! let mut session = FormSession::new(store, rules, Some(&city)).unwrap();
//! assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
//!
//! session.updated("name", json!("Hamburg")).unwrap();
//! session.save().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod context;
mod crud;
mod error;
mod events;
mod filter;
mod options;
mod path;
mod resolver;
mod rules;
mod session;

pub use buffer::{BufferMeta, FormBuffer, SYSTEM_KEY};
pub use context::ContextManager;
pub use crud::{CrudProcessor, FieldUpdate};
pub use error::{FormError, FormResult};
pub use events::{EventFeed, FormEvent};
pub use filter::{allowed_fields, extract_filtered, sanitize};
pub use options::{OptionResolver, SelectOption};
pub use path::{get_path, set_path};
pub use resolver::ModelResolver;
pub use rules::{RuleCatalog, RuleSpec};
pub use session::FormSession;
