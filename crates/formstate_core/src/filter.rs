//! Field filtering and sanitization.
//!
//! Pure functions that derive the allowed field surface of a context from
//! the rule catalog, extract a record's attributes against it, and
//! normalize input values. `sanitize` is the single normalization point:
//! every write path (auto-save, batch save, buffer reflection) goes
//! through it so stored and displayed values never diverge.

use crate::path::set_path;
use crate::rules::RuleCatalog;
use formstate_store::{FieldMap, Record};
use serde_json::Value;

/// Derives the allowed field paths for a context.
///
/// For the root context every declared key is allowed, including
/// dot-nested relation fields, and each discovered relation additionally
/// contributes a synthesized `<relation>_id` field so foreign keys
/// surface even without an explicit rule. For a named context only keys
/// carrying the `context.` prefix contribute, with the prefix stripped.
#[must_use]
pub fn allowed_fields(rules: &RuleCatalog, context: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let prefix = format!("{context}.");

    for key in rules.keys() {
        let field = if context.is_empty() {
            key.to_owned()
        } else {
            match key.strip_prefix(&prefix) {
                Some(field) => field.to_owned(),
                None => continue,
            }
        };
        if !fields.contains(&field) {
            fields.push(field);
        }
    }

    for relation in rules.relations(context) {
        // "pivot" is join-table data, not a traversable relation.
        if relation != "pivot" {
            let synthesized = format!("{relation}_id");
            if !fields.contains(&synthesized) {
                fields.push(synthesized);
            }
        }
    }

    fields
}

/// Extracts a record's attributes filtered by the allowed fields of a
/// context.
///
/// Each allowed field path is read from the record and written at the
/// same path into the result; absent fields are skipped. The primary key
/// of a persisted record is always force-included, because internal
/// logic depends on identity being present.
#[must_use]
pub fn extract_filtered(
    record: &Record,
    rules: &RuleCatalog,
    context: &str,
    key_name: &str,
) -> FieldMap {
    let mut filtered = FieldMap::new();

    for field in allowed_fields(rules, context) {
        if let Some(value) = record.get_path(&field) {
            set_path(&mut filtered, &field, value.clone());
        }
    }

    if let Some(id) = record.id() {
        if !filtered.contains_key(key_name) {
            filtered.insert(key_name.to_owned(), id.to_value());
        }
    }

    filtered
}

/// Sanitizes an input value for a field.
///
/// Strings are trimmed; a string that is empty after trimming becomes
/// null when the field is in the nullable set; non-strings pass through
/// unchanged. The trim-then-check order keeps the function idempotent.
#[must_use]
pub fn sanitize(key: &str, value: Value, nullables: &[String]) -> Value {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if trimmed.is_empty() && nullables.iter().any(|n| n == key) {
            return Value::Null;
        }
        return Value::String(trimmed.to_owned());
    }
    value
}
