//! # FormState Testkit
//!
//! Test utilities for FormState.
//!
//! This crate provides:
//! - A seeded travel-catalog fixture exercising every relationship kind
//! - Session helpers for scenario tests
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use formstate_testkit::with_session;
//! use serde_json::json;
//!
//! with_session(|session, _| {
//!     assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
