//! Property-based test generators using proptest.

use formstate_store::FieldMap;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for plausible field keys.
pub fn field_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}"
}

/// Strategy for scalar field values.
pub fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(|n| Value::from(i64::from(n))),
        "[ -~]{0,24}".prop_map(Value::from),
    ]
}

/// Strategy for flat item maps of up to `max` entries.
pub fn field_items(max: usize) -> impl Strategy<Value = FieldMap> {
    proptest::collection::vec((field_key(), scalar_value()), 0..max)
        .prop_map(|pairs| pairs.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_keys_never_collide_with_the_reserved_key(key in field_key()) {
            prop_assert_ne!(key, formstate_core::SYSTEM_KEY.to_owned());
        }

        #[test]
        fn generated_items_respect_the_size_bound(items in field_items(6)) {
            prop_assert!(items.len() < 6);
        }
    }
}
