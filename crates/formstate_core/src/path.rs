//! Dot-path access over field maps.
//!
//! The buffer addresses nested values with dot paths (`country.name`,
//! `brands.pivot.status`). These utilities are the single place that
//! interprets such paths over [`FieldMap`] data.

use formstate_store::FieldMap;
use serde_json::Value;

/// Reads the value at a dot path, if present.
#[must_use]
pub fn get_path<'a>(map: &'a FieldMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes a value at a dot path, materializing intermediate objects.
///
/// A non-object value sitting at an intermediate key is replaced by an
/// empty object before descending; the write itself never fails.
pub fn set_path(map: &mut FieldMap, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(last) => last,
        None => return,
    };

    let mut current = map;
    for segment in segments {
        let slot = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(FieldMap::new()));
        if !slot.is_object() {
            *slot = Value::Object(FieldMap::new());
        }
        current = match slot.as_object_mut() {
            Some(object) => object,
            None => return, // unreachable: slot was just made an object
        };
    }
    current.insert(last.to_owned(), value);
}
