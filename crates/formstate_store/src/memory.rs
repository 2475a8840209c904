//! In-memory record store.

use crate::error::{StoreError, StoreResult};
use crate::record::{FieldMap, Record, RecordId, TypeSchema};
use crate::relation::{RelationDescriptor, RelationKind};
use crate::store::RecordStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Rows of one record type.
#[derive(Debug, Default)]
struct TypeTable {
    rows: BTreeMap<RecordId, FieldMap>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct Inner {
    schemas: BTreeMap<String, TypeSchema>,
    tables: BTreeMap<String, TypeTable>,
    relations: BTreeMap<String, Vec<RelationDescriptor>>,
    /// Pivot rows keyed by `host_type/relation`, then `(host_id, related_id)`.
    pivots: BTreeMap<String, BTreeMap<(RecordId, RecordId), FieldMap>>,
}

/// An in-memory record store.
///
/// Suitable for unit tests, integration tests and ephemeral editing
/// sessions. Types and relationships are registered up front; rows can
/// be seeded directly or created through the trait operations.
///
/// # Thread Safety
///
/// All state sits behind a [`parking_lot::RwLock`], so a `MemoryStore`
/// can be shared across threads behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use formstate_store::{MemoryStore, RecordStore, TypeSchema};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.register_type(TypeSchema::new("city").fillable(["name"]));
/// let city = store
///     .seed("city", [("name", json!("Berlin"))])
///     .unwrap();
/// assert!(city.exists());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type.
    pub fn register_type(&self, schema: TypeSchema) {
        let mut inner = self.inner.write();
        let name = schema.type_name().to_owned();
        inner.schemas.insert(name.clone(), schema);
        inner.tables.entry(name).or_default();
    }

    /// Registers a relationship on a host type.
    pub fn register_relation(&self, host_type: impl Into<String>, relation: RelationDescriptor) {
        self.inner
            .write()
            .relations
            .entry(host_type.into())
            .or_default()
            .push(relation);
    }

    /// Seeds a row, assigning the next integer id.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    pub fn seed<I, S>(&self, record_type: &str, attrs: I) -> StoreResult<Record>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut record = Record::new(record_type);
        for (key, value) in attrs {
            record.set(key, value);
        }
        self.save(&mut record)?;
        Ok(record)
    }

    /// Returns the number of rows of a type. Handy in assertions.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registered.
    pub fn count(&self, record_type: &str) -> StoreResult<usize> {
        let inner = self.inner.read();
        if !inner.schemas.contains_key(record_type) {
            return Err(StoreError::unknown_type(record_type));
        }
        Ok(inner
            .tables
            .get(record_type)
            .map_or(0, |table| table.rows.len()))
    }

    /// Returns a copy of a pivot row, if attached.
    #[must_use]
    pub fn pivot_row(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        related_id: &RecordId,
    ) -> Option<FieldMap> {
        let inner = self.inner.read();
        let host_id = host.id()?;
        inner
            .pivots
            .get(&pivot_table_key(host.record_type(), relation.name()))
            .and_then(|rows| rows.get(&(host_id.clone(), related_id.clone())))
            .cloned()
    }

    fn record_from_row(record_type: &str, id: &RecordId, row: &FieldMap) -> Record {
        Record::persisted(record_type, id.clone(), row.clone())
    }
}

fn pivot_table_key(host_type: &str, relation_name: &str) -> String {
    format!("{host_type}/{relation_name}")
}

/// Reads a record's foreign-key field as an id.
fn id_field(attrs: &FieldMap, field: &str) -> Option<RecordId> {
    attrs.get(field).and_then(RecordId::from_value)
}

impl Inner {
    fn schema(&self, record_type: &str) -> StoreResult<&TypeSchema> {
        self.schemas
            .get(record_type)
            .ok_or_else(|| StoreError::unknown_type(record_type))
    }

    fn table_mut(&mut self, record_type: &str) -> StoreResult<&mut TypeTable> {
        if !self.schemas.contains_key(record_type) {
            return Err(StoreError::unknown_type(record_type));
        }
        Ok(self.tables.entry(record_type.to_owned()).or_default())
    }
}

impl RecordStore for MemoryStore {
    fn schema(&self, record_type: &str) -> StoreResult<TypeSchema> {
        self.inner.read().schema(record_type).cloned()
    }

    fn find(&self, record_type: &str, id: &RecordId) -> StoreResult<Option<Record>> {
        let inner = self.inner.read();
        inner.schema(record_type)?;
        Ok(inner
            .tables
            .get(record_type)
            .and_then(|table| table.rows.get(id))
            .map(|row| Self::record_from_row(record_type, id, row)))
    }

    fn new_instance(&self, record_type: &str) -> StoreResult<Record> {
        self.inner.read().schema(record_type)?;
        Ok(Record::new(record_type))
    }

    fn save(&self, record: &mut Record) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let key_name = inner.schema(record.record_type())?.key().to_owned();
        let record_type = record.record_type().to_owned();
        let table = inner.table_mut(&record_type)?;

        let id = match record.id() {
            Some(id) => id.clone(),
            None => {
                table.next_id += 1;
                RecordId::Int(table.next_id)
            }
        };

        let mut row = record.attrs().clone();
        row.insert(key_name, id.to_value());
        table.rows.insert(id.clone(), row.clone());

        record.set_id(id);
        record.set_attrs(row);
        Ok(())
    }

    fn delete(&self, record: &Record) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.schema(record.record_type())?;
        let Some(id) = record.id() else {
            return Ok(());
        };
        let record_type = record.record_type().to_owned();

        if let Some(table) = inner.tables.get_mut(&record_type) {
            table.rows.remove(id);
        }

        // Drop pivot rows that reference the deleted record on either side.
        let descriptors: Vec<(String, RelationDescriptor)> = inner
            .relations
            .iter()
            .flat_map(|(host, rels)| rels.iter().map(|r| (host.clone(), r.clone())))
            .filter(|(_, r)| r.kind() == RelationKind::BelongsToMany)
            .collect();
        for (host_type, relation) in descriptors {
            let key = pivot_table_key(&host_type, relation.name());
            if let Some(rows) = inner.pivots.get_mut(&key) {
                rows.retain(|(host_id, related_id), _| {
                    !(host_type == record_type && host_id == id)
                        && !(relation.related_type() == record_type && related_id == id)
                });
            }
        }
        Ok(())
    }

    fn relation(&self, record_type: &str, name: &str) -> StoreResult<Option<RelationDescriptor>> {
        let inner = self.inner.read();
        inner.schema(record_type)?;
        Ok(inner
            .relations
            .get(record_type)
            .and_then(|rels| rels.iter().find(|r| r.name() == name))
            .cloned())
    }

    fn related_find(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> StoreResult<Option<Record>> {
        match relation.kind() {
            RelationKind::BelongsTo => {
                let fk = relation.foreign_key().ok_or_else(|| {
                    StoreError::invalid_relation(relation.name(), "missing foreign key")
                })?;
                match id_field(host.attrs(), fk) {
                    Some(current) if current == *id => self.find(relation.related_type(), id),
                    _ => {
                        self.schema(relation.related_type())?;
                        Ok(None)
                    }
                }
            }
            RelationKind::HasMany | RelationKind::MorphMany => {
                let Some(candidate) = self.find(relation.related_type(), id)? else {
                    return Ok(None);
                };
                Ok(child_of(host, relation, &candidate).then_some(candidate))
            }
            RelationKind::BelongsToMany => {
                self.schema(relation.related_type())?;
                let Some(host_id) = host.id() else {
                    return Ok(None);
                };
                let pivot = {
                    let inner = self.inner.read();
                    inner
                        .pivots
                        .get(&pivot_table_key(host.record_type(), relation.name()))
                        .and_then(|rows| rows.get(&(host_id.clone(), id.clone())).cloned())
                };
                let Some(pivot) = pivot else {
                    return Ok(None);
                };
                let Some(mut record) = self.find(relation.related_type(), id)? else {
                    return Ok(None);
                };
                record.set("pivot", Value::Object(pivot));
                Ok(Some(record))
            }
        }
    }

    fn related_one(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Option<Record>> {
        if relation.kind() != RelationKind::BelongsTo {
            self.schema(relation.related_type())?;
            return Ok(None);
        }
        let fk = relation
            .foreign_key()
            .ok_or_else(|| StoreError::invalid_relation(relation.name(), "missing foreign key"))?;
        match id_field(host.attrs(), fk) {
            Some(target) => self.find(relation.related_type(), &target),
            None => {
                self.schema(relation.related_type())?;
                Ok(None)
            }
        }
    }

    fn related_all(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
    ) -> StoreResult<Vec<Record>> {
        match relation.kind() {
            RelationKind::BelongsTo => Ok(self.related_one(host, relation)?.into_iter().collect()),
            RelationKind::HasMany | RelationKind::MorphMany => {
                let all = self.list_all(relation.related_type())?;
                Ok(all
                    .into_iter()
                    .filter(|candidate| child_of(host, relation, candidate))
                    .collect())
            }
            RelationKind::BelongsToMany => {
                self.schema(relation.related_type())?;
                let Some(host_id) = host.id() else {
                    return Ok(Vec::new());
                };
                let attached: Vec<(RecordId, FieldMap)> = {
                    let inner = self.inner.read();
                    inner
                        .pivots
                        .get(&pivot_table_key(host.record_type(), relation.name()))
                        .map(|rows| {
                            rows.iter()
                                .filter(|((h, _), _)| h == host_id)
                                .map(|((_, related), pivot)| (related.clone(), pivot.clone()))
                                .collect()
                        })
                        .unwrap_or_default()
                };
                let mut result = Vec::new();
                for (related_id, pivot) in attached {
                    if let Some(mut record) = self.find(relation.related_type(), &related_id)? {
                        record.set("pivot", Value::Object(pivot));
                        result.push(record);
                    }
                }
                Ok(result)
            }
        }
    }

    fn create_related(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        attrs: FieldMap,
        pivot: FieldMap,
    ) -> StoreResult<Record> {
        let host_id = host
            .id()
            .ok_or_else(|| StoreError::unsaved_record(host.record_type()))?
            .clone();
        let mut record = self.new_instance(relation.related_type())?;
        record.set_attrs(attrs);

        match relation.kind() {
            RelationKind::HasMany => {
                let fk = relation.foreign_key().ok_or_else(|| {
                    StoreError::invalid_relation(relation.name(), "missing foreign key")
                })?;
                record.set(fk, host_id.to_value());
                self.save(&mut record)?;
            }
            RelationKind::MorphMany => {
                let fk = relation.foreign_key().ok_or_else(|| {
                    StoreError::invalid_relation(relation.name(), "missing foreign key")
                })?;
                let type_field = relation.morph_type().ok_or_else(|| {
                    StoreError::invalid_relation(relation.name(), "missing morph type field")
                })?;
                record.set(fk, host_id.to_value());
                record.set(type_field, Value::from(host.record_type()));
                self.save(&mut record)?;
            }
            RelationKind::BelongsToMany => {
                self.save(&mut record)?;
                let id = record.id().cloned().unwrap_or(RecordId::Int(0));
                self.attach(host, relation, &id, pivot)?;
            }
            RelationKind::BelongsTo => {
                return Err(StoreError::invalid_relation(
                    relation.name(),
                    "cannot create through a BelongsTo; set the host foreign key instead",
                ));
            }
        }
        Ok(record)
    }

    fn attach(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
        pivot: FieldMap,
    ) -> StoreResult<()> {
        if relation.kind() != RelationKind::BelongsToMany {
            return Err(StoreError::invalid_relation(
                relation.name(),
                "attach requires a BelongsToMany relation",
            ));
        }
        let host_id = host
            .id()
            .ok_or_else(|| StoreError::unsaved_record(host.record_type()))?
            .clone();
        self.inner
            .write()
            .pivots
            .entry(pivot_table_key(host.record_type(), relation.name()))
            .or_default()
            .insert((host_id, id.clone()), pivot);
        Ok(())
    }

    fn detach(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> StoreResult<()> {
        if relation.kind() != RelationKind::BelongsToMany {
            return Err(StoreError::invalid_relation(
                relation.name(),
                "detach requires a BelongsToMany relation",
            ));
        }
        let Some(host_id) = host.id() else {
            return Ok(());
        };
        if let Some(rows) = self
            .inner
            .write()
            .pivots
            .get_mut(&pivot_table_key(host.record_type(), relation.name()))
        {
            rows.remove(&(host_id.clone(), id.clone()));
        }
        Ok(())
    }

    fn update_pivot(
        &self,
        host: &Record,
        relation: &RelationDescriptor,
        id: &RecordId,
        pivot: FieldMap,
    ) -> StoreResult<()> {
        if relation.kind() != RelationKind::BelongsToMany {
            return Err(StoreError::invalid_relation(
                relation.name(),
                "pivot update requires a BelongsToMany relation",
            ));
        }
        let Some(host_id) = host.id() else {
            return Ok(());
        };
        if let Some(rows) = self
            .inner
            .write()
            .pivots
            .get_mut(&pivot_table_key(host.record_type(), relation.name()))
        {
            if let Some(row) = rows.get_mut(&(host_id.clone(), id.clone())) {
                for (key, value) in pivot {
                    row.insert(key, value);
                }
            }
        }
        Ok(())
    }

    fn list_all(&self, record_type: &str) -> StoreResult<Vec<Record>> {
        let inner = self.inner.read();
        inner.schema(record_type)?;
        Ok(inner
            .tables
            .get(record_type)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .map(|(id, row)| Self::record_from_row(record_type, id, row))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// True if `candidate` points back at `host` through a `HasMany` or
/// `MorphMany` foreign key.
fn child_of(host: &Record, relation: &RelationDescriptor, candidate: &Record) -> bool {
    let Some(host_id) = host.id() else {
        return false;
    };
    let Some(fk) = relation.foreign_key() else {
        return false;
    };
    if id_field(candidate.attrs(), fk).as_ref() != Some(host_id) {
        return false;
    }
    match relation.morph_type() {
        Some(type_field) => {
            candidate.get(type_field).and_then(Value::as_str) == Some(host.record_type())
        }
        None => true,
    }
}
