//! Handler for `BelongsToMany` relationships.
//!
//! Data for this kind splits in two: the related record's own fields and
//! the `pivot` sub-map destined for the join row. Selecting an existing
//! record attaches it; omitting the key creates and attaches a new one.

use crate::error::FormResult;
use formstate_store::{FieldMap, Record, RecordId, RecordStore, RelationDescriptor};
use serde_json::Value;
use tracing::debug;

use super::handler::{RelationHandler, Scope};
use super::{fillable_attrs, update_record};

pub(crate) struct BelongsToManyHandler;

/// Splits the `pivot` sub-map off the context data.
fn split_pivot(data: &mut FieldMap) -> FieldMap {
    match data.shift_remove("pivot") {
        Some(Value::Object(pivot)) => coerce_pivot(pivot),
        _ => FieldMap::new(),
    }
}

/// Coerces numeric pivot strings to integers.
///
/// UI inputs deliver everything as strings, but join columns are
/// typically numeric; `"3"` becomes `3` while `"3a"` stays a string.
fn coerce_pivot(pivot: FieldMap) -> FieldMap {
    pivot
        .into_iter()
        .map(|(key, value)| {
            let value = match &value {
                Value::String(s) => match s.parse::<i64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => value,
                },
                _ => value,
            };
            (key, value)
        })
        .collect()
}

impl RelationHandler for BelongsToManyHandler {
    fn save(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: Option<&RecordId>,
        mut data: FieldMap,
    ) -> FormResult<()> {
        let pivot = split_pivot(&mut data);
        let key_name = scope.store.schema(relation.related_type())?.key().to_owned();

        match id {
            None => {
                let selected = data.get(&key_name).and_then(RecordId::from_value);
                match selected {
                    Some(selected) => {
                        debug!(relation = relation.name(), id = %selected, "attaching existing record");
                        scope.store.attach(host, relation, &selected, pivot)?;
                        scope.buffer.set_active_id(Some(selected));
                    }
                    None => {
                        let attrs = fillable_attrs(scope.store, relation.related_type(), &data)?;
                        let created = scope.store.create_related(host, relation, attrs, pivot)?;
                        scope.buffer.set_active_id(created.id().cloned());
                    }
                }
                Ok(())
            }
            Some(id) => {
                data.shift_remove(&key_name);
                if !data.is_empty() {
                    if let Some(mut member) = scope.store.related_find(host, relation, id)? {
                        update_record(scope.store, &mut member, &data)?;
                    }
                }
                if !pivot.is_empty() {
                    scope.store.update_pivot(host, relation, id, pivot)?;
                }
                Ok(())
            }
        }
    }

    fn update_field(
        &self,
        scope: &mut Scope<'_>,
        host: &mut Record,
        relation: &RelationDescriptor,
        target: &Record,
        real_key: &str,
        value: &Value,
    ) -> FormResult<bool> {
        let Some(column) = real_key.strip_prefix("pivot.") else {
            return Ok(false);
        };
        let Some(id) = target.id() else {
            return Ok(false);
        };
        let mut pivot = FieldMap::new();
        pivot.insert(column.to_owned(), value.clone());
        scope
            .store
            .update_pivot(host, relation, id, coerce_pivot(pivot))?;
        Ok(true)
    }

    fn delete(
        &self,
        store: &dyn RecordStore,
        host: &mut Record,
        relation: &RelationDescriptor,
        id: &RecordId,
    ) -> FormResult<()> {
        // Detach only; the related record survives.
        store.detach(host, relation, id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pivot_coercion_is_numeric_only() {
        let mut pivot = FieldMap::new();
        pivot.insert("status".into(), json!("3"));
        pivot.insert("note".into(), json!("3a"));
        pivot.insert("flag".into(), json!(true));
        let coerced = coerce_pivot(pivot);
        assert_eq!(coerced.get("status"), Some(&json!(3)));
        assert_eq!(coerced.get("note"), Some(&json!("3a")));
        assert_eq!(coerced.get("flag"), Some(&json!(true)));
    }

    #[test]
    fn split_pivot_tolerates_non_map_values() {
        let mut data = FieldMap::new();
        data.insert("pivot".into(), json!("oops"));
        data.insert("name".into(), json!("x"));
        assert!(split_pivot(&mut data).is_empty());
        assert!(!data.contains_key("pivot"));
    }
}
