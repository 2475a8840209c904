//! Record and schema types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// An ordered map of field names to values.
///
/// This is the attribute set of a [`Record`] as well as the shape of
/// nested sub-maps (relation data, pivot data) inside a form buffer.
pub type FieldMap = serde_json::Map<String, Value>;

/// Identifier of a record within its type.
///
/// Ids are assigned by the store (integer auto-increment) or supplied by
/// the caller (string keys such as slugs or UUIDs).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl RecordId {
    /// Returns the id as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.clone()),
        }
    }

    /// Parses an id out of a JSON value.
    ///
    /// Integer numbers and strings are accepted; anything else
    /// (including floats, null, maps) is `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// An in-memory instance of a stored entity.
///
/// A record carries its type name, an optional id (`None` means the
/// record has not been persisted yet) and a flat attribute map. Mutating
/// a record never touches the store; persistence happens only through
/// [`crate::RecordStore::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: String,
    id: Option<RecordId>,
    attrs: FieldMap,
}

impl Record {
    /// Creates a fresh unsaved record of the given type.
    #[must_use]
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: None,
            attrs: FieldMap::new(),
        }
    }

    /// Creates a persisted record with an id and attributes.
    #[must_use]
    pub fn persisted(record_type: impl Into<String>, id: RecordId, attrs: FieldMap) -> Self {
        Self {
            record_type: record_type.into(),
            id: Some(id),
            attrs,
        }
    }

    /// Returns the record's type name.
    #[must_use]
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Returns the record's id, if persisted.
    #[must_use]
    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    /// Marks the record as persisted under the given id.
    pub fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    /// Returns true if the record has been persisted.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Reads an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Writes an attribute on the in-memory instance.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attrs.insert(key.into(), value);
    }

    /// Reads a possibly dot-nested attribute path.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.attrs.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Returns the full attribute map.
    #[must_use]
    pub fn attrs(&self) -> &FieldMap {
        &self.attrs
    }

    /// Returns the full attribute map mutably.
    pub fn attrs_mut(&mut self) -> &mut FieldMap {
        &mut self.attrs
    }

    /// Replaces the attribute map.
    pub fn set_attrs(&mut self, attrs: FieldMap) {
        self.attrs = attrs;
    }
}

/// A variant of an enumeration cast.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    /// Variant name as declared (e.g. `ACTIVE`).
    pub name: String,
    /// Stored value (e.g. `"active"` or `1`).
    pub value: Value,
}

/// Declares that an attribute holds values of a closed enumeration.
///
/// Enum casts drive option listing for select inputs; the store itself
/// does not validate attribute values against them.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumCast {
    name: String,
    variants: Vec<EnumVariant>,
}

impl EnumCast {
    /// Creates an empty enum cast with the given type name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    /// Adds a variant.
    #[must_use]
    pub fn variant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variants.push(EnumVariant {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Returns the enumeration's type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the variants in declaration order.
    #[must_use]
    pub fn variants(&self) -> &[EnumVariant] {
        &self.variants
    }
}

/// Schema of a record type.
///
/// Declares the primary key name, which fields may be mass-assigned, and
/// any enum casts on attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    name: String,
    key_name: String,
    fillable: Vec<String>,
    casts: BTreeMap<String, EnumCast>,
}

impl TypeSchema {
    /// Creates a schema with the default key name `id`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_name: "id".to_owned(),
            fillable: Vec::new(),
            casts: BTreeMap::new(),
        }
    }

    /// Overrides the primary key name.
    #[must_use]
    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Declares the mass-assignable fields.
    #[must_use]
    pub fn fillable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillable = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declares an enum cast on an attribute.
    #[must_use]
    pub fn cast(mut self, attribute: impl Into<String>, cast: EnumCast) -> Self {
        self.casts.insert(attribute.into(), cast);
        self
    }

    /// Returns the record type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.name
    }

    /// Returns the primary key name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key_name
    }

    /// Returns true if the field may be mass-assigned.
    #[must_use]
    pub fn is_fillable(&self, field: &str) -> bool {
        self.fillable.iter().any(|f| f == field)
    }

    /// Returns the enum cast for an attribute, if declared.
    #[must_use]
    pub fn enum_cast(&self, attribute: &str) -> Option<&EnumCast> {
        self.casts.get(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!(7)), Some(RecordId::Int(7)));
        assert_eq!(
            RecordId::from_value(&json!("abc")),
            Some(RecordId::Str("abc".into()))
        );
        assert_eq!(RecordId::from_value(&json!(null)), None);
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
    }

    #[test]
    fn record_id_serde_untagged() {
        let id: RecordId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, RecordId::Int(42));
        assert_eq!(serde_json::to_value(&id).unwrap(), json!(42));
    }

    #[test]
    fn record_path_access() {
        let mut record = Record::new("city");
        record.set("name", json!("Berlin"));
        record.set("country", json!({"name": "Germany"}));

        assert_eq!(record.get_path("name"), Some(&json!("Berlin")));
        assert_eq!(record.get_path("country.name"), Some(&json!("Germany")));
        assert_eq!(record.get_path("country.missing"), None);
        assert_eq!(record.get_path("name.deeper"), None);
    }

    #[test]
    fn schema_fillable_and_key() {
        let schema = TypeSchema::new("city")
            .key_name("city_id")
            .fillable(["name", "country_id"]);
        assert_eq!(schema.key(), "city_id");
        assert!(schema.is_fillable("name"));
        assert!(!schema.is_fillable("city_id"));
    }

    #[test]
    fn enum_cast_variants() {
        let cast = EnumCast::new("Status")
            .variant("ACTIVE", "active")
            .variant("PENDING", "pending");
        assert_eq!(cast.variants().len(), 2);
        assert_eq!(cast.variants()[0].value, json!("active"));
    }
}
