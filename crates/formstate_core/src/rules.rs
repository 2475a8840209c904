//! Rule catalog: the declaration of loadable and editable fields.
//!
//! The catalog maps dot-path field names to validation rule declarations.
//! Validation itself happens elsewhere; this core only cares about two
//! pieces of catalog syntax:
//!
//! - a key `relation.field` declares field `field` of relation `relation`,
//!   and its presence is what makes the relation editable at all
//! - the token `nullable` marks a field whose empty-string input is
//!   coerced to null on write

use crate::buffer::SYSTEM_KEY;

/// A per-field rule declaration.
///
/// Either a pipe-delimited line (`"required|nullable|max:40"`) or an
/// explicit token list. All tokens except `nullable` are opaque to this
/// core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSpec {
    /// Pipe-delimited rule line.
    Line(String),
    /// Explicit token list.
    Tokens(Vec<String>),
}

impl RuleSpec {
    /// Returns true if any token of the declaration contains `nullable`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Line(line) => line.split('|').any(|token| token.contains("nullable")),
            Self::Tokens(tokens) => tokens.iter().any(|token| token.contains("nullable")),
        }
    }
}

impl From<&str> for RuleSpec {
    fn from(line: &str) -> Self {
        Self::Line(line.to_owned())
    }
}

impl From<String> for RuleSpec {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<&str>> for RuleSpec {
    fn from(tokens: Vec<&str>) -> Self {
        Self::Tokens(tokens.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<String>> for RuleSpec {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

/// Ordered mapping from field paths to rule declarations.
///
/// The catalog doubles as the access-control list of the form: a field
/// may only be loaded, edited or persisted if it is declared here, and a
/// relation may only be entered if at least one key carries its prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCatalog {
    rules: Vec<(String, RuleSpec)>,
}

impl RuleCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, replacing any earlier declaration of the same key.
    #[must_use]
    pub fn rule(mut self, key: impl Into<String>, spec: impl Into<RuleSpec>) -> Self {
        let key = key.into();
        self.rules.retain(|(existing, _)| *existing != key);
        self.rules.push((key, spec.into()));
        self
    }

    /// Returns true if the exact key is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.rules.iter().any(|(existing, _)| existing == key)
    }

    /// Returns the number of declared rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates `(key, spec)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleSpec)> {
        self.rules.iter().map(|(key, spec)| (key.as_str(), spec))
    }

    /// Returns the keys of all fields declared nullable.
    #[must_use]
    pub fn nullables(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|(_, spec)| spec.is_nullable())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Extracts the unique relation names declared relative to `context`.
    ///
    /// A relation name is the first segment of a dot key after the
    /// context prefix is stripped.
    #[must_use]
    pub fn relations(&self, context: &str) -> Vec<String> {
        let prefix = if context.is_empty() {
            String::new()
        } else {
            format!("{context}.")
        };
        let mut relations: Vec<String> = Vec::new();
        for key in self.keys() {
            let relative = if prefix.is_empty() {
                key
            } else {
                match key.strip_prefix(&prefix) {
                    Some(relative) => relative,
                    None => continue,
                }
            };
            if let Some((first, _)) = relative.split_once('.') {
                if !relations.iter().any(|r| r == first) {
                    relations.push(first.to_owned());
                }
            }
        }
        relations
    }

    /// Returns true if the relation is editable, i.e. some key carries
    /// its dot prefix.
    #[must_use]
    pub fn allows_relation(&self, relation: &str) -> bool {
        let prefix = format!("{relation}.");
        self.keys().any(|key| key.starts_with(&prefix))
    }

    /// Returns the reserved key used by any rule, if present.
    ///
    /// Sessions refuse catalogs that declare the reserved metadata key.
    #[must_use]
    pub fn reserved_key(&self) -> Option<&str> {
        self.keys()
            .find(|key| *key == SYSTEM_KEY || key.starts_with(&format!("{SYSTEM_KEY}.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RuleCatalog {
        RuleCatalog::new()
            .rule("name", "required")
            .rule("motto", "nullable|max:80")
            .rule("country.name", "required")
            .rule("country.code", vec!["required", "nullable"])
            .rule("brands.pivot.status", "required")
    }

    #[test]
    fn nullable_detection_in_both_forms() {
        let nullables = catalog().nullables();
        assert_eq!(nullables, vec!["motto".to_owned(), "country.code".to_owned()]);
    }

    #[test]
    fn relations_relative_to_root() {
        assert_eq!(catalog().relations(""), vec!["country", "brands"]);
    }

    #[test]
    fn relations_relative_to_a_context() {
        assert_eq!(catalog().relations("brands"), vec!["pivot"]);
        assert!(catalog().relations("country").is_empty());
    }

    #[test]
    fn allows_relation_requires_a_prefixed_key() {
        let rules = catalog();
        assert!(rules.allows_relation("country"));
        assert!(rules.allows_relation("brands"));
        assert!(!rules.allows_relation("name"));
        assert!(!rules.allows_relation("cities"));
    }

    #[test]
    fn duplicate_rule_replaces_earlier() {
        let rules = RuleCatalog::new().rule("name", "required").rule("name", "nullable");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.nullables(), vec!["name".to_owned()]);
    }

    #[test]
    fn reserved_key_is_reported() {
        let rules = RuleCatalog::new().rule("__system", "required");
        assert_eq!(rules.reserved_key(), Some("__system"));
        assert!(catalog().reserved_key().is_none());
    }
}
