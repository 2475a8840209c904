//! Select-option listing for relation and enum fields.
//!
//! Produces value/label pairs for UI select inputs: all records of a
//! single-valued or many-to-many relation, or the variants of an enum
//! cast. Labels come from a column, or from a mask with parenthesized
//! field tokens (`"(name) - (code)"`).

use crate::error::{FormError, FormResult};
use formstate_store::{EnumVariant, Record, RecordStore, RelationKind};
use serde_json::Value;
use std::sync::Arc;

/// A single option of a select input.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    /// The stored value (a record id or an enum value).
    pub value: Value,
    /// The display label.
    pub label: String,
}

/// Lists select options from the store.
#[derive(Clone)]
pub struct OptionResolver {
    store: Arc<dyn RecordStore>,
}

impl OptionResolver {
    /// Creates a resolver over a store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Lists id/label options for a relation of the host record.
    ///
    /// Only `BelongsTo` and `BelongsToMany` relations are selectable
    /// from a list of existing records.
    ///
    /// # Errors
    ///
    /// - [`FormError::RelationDoesNotExist`] for an unknown name
    /// - [`FormError::InvalidRelationKind`] for other kinds
    pub fn relation_options(
        &self,
        host: &Record,
        relation: &str,
        label_column: &str,
    ) -> FormResult<Vec<SelectOption>> {
        self.relation_options_masked(host, relation, &format!("({label_column})"))
    }

    /// Like [`Self::relation_options`], with a label mask.
    ///
    /// Every `(field)` token is replaced by the record's field value.
    ///
    /// # Errors
    ///
    /// Additionally returns [`FormError::OptionMaskSyntax`] for a mask
    /// without any token.
    pub fn relation_options_masked(
        &self,
        host: &Record,
        relation: &str,
        mask: &str,
    ) -> FormResult<Vec<SelectOption>> {
        let descriptor = self
            .store
            .relation(host.record_type(), relation)?
            .ok_or_else(|| FormError::relation_does_not_exist(relation, host.record_type()))?;
        match descriptor.kind() {
            RelationKind::BelongsTo | RelationKind::BelongsToMany => {}
            kind => return Err(FormError::invalid_relation_kind(relation, kind)),
        }

        let records = self.store.list_all(descriptor.related_type())?;
        records
            .iter()
            .map(|record| {
                let label = apply_mask(mask, |field| {
                    record.get(field).map(display_value)
                })?;
                Ok(SelectOption {
                    value: record.id().map_or(Value::Null, |id| id.to_value()),
                    label,
                })
            })
            .collect()
    }

    /// Lists the variants of an attribute's enum cast.
    ///
    /// Labels are the headline-cased stored values (`"in_review"` turns
    /// into `"In Review"`).
    ///
    /// # Errors
    ///
    /// Returns [`FormError::MissingEnumCast`] when the attribute carries
    /// no enum cast.
    pub fn enum_options(
        &self,
        record_type: &str,
        attribute: &str,
    ) -> FormResult<Vec<SelectOption>> {
        let variants = self.enum_variants(record_type, attribute)?;
        Ok(variants
            .into_iter()
            .map(|variant| SelectOption {
                label: headline(&display_value(&variant.value)),
                value: variant.value,
            })
            .collect())
    }

    /// Like [`Self::enum_options`], with a label mask.
    ///
    /// `(name)` expands to the headline-cased variant name, `(value)` to
    /// the stored value.
    ///
    /// # Errors
    ///
    /// Additionally returns [`FormError::OptionMaskSyntax`] for a mask
    /// without any token.
    pub fn enum_options_masked(
        &self,
        record_type: &str,
        attribute: &str,
        mask: &str,
    ) -> FormResult<Vec<SelectOption>> {
        let variants = self.enum_variants(record_type, attribute)?;
        variants
            .into_iter()
            .map(|variant| {
                let label = apply_mask(mask, |token| match token {
                    "name" => Some(headline(&variant.name)),
                    "value" => Some(display_value(&variant.value)),
                    _ => None,
                })?;
                Ok(SelectOption {
                    value: variant.value,
                    label,
                })
            })
            .collect()
    }

    fn enum_variants(&self, record_type: &str, attribute: &str) -> FormResult<Vec<EnumVariant>> {
        let schema = self.store.schema(record_type)?;
        let cast = schema
            .enum_cast(attribute)
            .ok_or_else(|| FormError::missing_enum_cast(record_type, attribute))?;
        Ok(cast.variants().to_vec())
    }
}

/// Expands parenthesized tokens in a mask via `lookup`.
///
/// Unresolvable tokens expand to nothing; a mask containing no token at
/// all is malformed.
fn apply_mask(mask: &str, lookup: impl Fn(&str) -> Option<String>) -> FormResult<String> {
    let mut out = String::new();
    let mut rest = mask;
    let mut tokens = 0;
    while let Some(start) = rest.find('(') {
        let after = &rest[start + 1..];
        let Some(end) = after.find(')') else {
            out.push_str(&rest[..=start]);
            rest = after;
            continue;
        };
        out.push_str(&rest[..start]);
        tokens += 1;
        if let Some(value) = lookup(&after[..end]) {
            out.push_str(&value);
        }
        rest = &after[end + 1..];
    }
    if tokens == 0 {
        return Err(FormError::option_mask_syntax(mask));
    }
    out.push_str(rest);
    Ok(out)
}

/// Renders a scalar value for display.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Headline-cases a string: separators become spaces, words capitalize.
fn headline(input: &str) -> String {
    input
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
