//! Wire-format round trips over generated buffers.

use formstate_core::{FormBuffer, SYSTEM_KEY};
use formstate_store::RecordId;
use formstate_testkit::{field_items, scalar_value};
use proptest::prelude::*;

proptest! {
    #[test]
    fn buffer_survives_the_wire(
        items in field_items(8),
        auto_save in any::<bool>(),
        root_id in proptest::option::of(any::<i64>()),
    ) {
        let mut buffer = FormBuffer::new();
        buffer.set_root_model("city", root_id.map(RecordId::Int));
        buffer.set_auto_save(auto_save);
        for (key, value) in items {
            if key == SYSTEM_KEY {
                continue;
            }
            buffer.put(key, value).unwrap();
        }

        let wire = buffer.to_wire().unwrap();
        prop_assert!(wire.contains_key(SYSTEM_KEY));

        let restored = FormBuffer::from_wire(wire).unwrap();
        prop_assert_eq!(&restored, &buffer);
        prop_assert!(!restored.all().contains_key(SYSTEM_KEY));
    }

    #[test]
    fn nested_writes_survive_the_wire(value in scalar_value()) {
        let mut buffer = FormBuffer::new();
        buffer.set_root_model("city", Some(RecordId::Int(1)));
        buffer.set_nested("country.name", value).unwrap();

        let restored = FormBuffer::from_wire(buffer.to_wire().unwrap()).unwrap();
        prop_assert_eq!(restored, buffer);
    }
}
