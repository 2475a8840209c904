//! End-to-end editing scenarios over the seeded travel fixture.

use formstate_core::{FormError, FormEvent};
use formstate_store::{RecordId, RecordStore};
use formstate_testkit::{with_session, TravelFixture};
use serde_json::json;

#[test]
fn root_load_shows_declared_fields_only() {
    with_session(|session, _| {
        let buffer = session.buffer();
        assert_eq!(buffer.get("name"), Some(&json!("Berlin")));
        assert_eq!(buffer.get("status"), Some(&json!("active")));
        assert_eq!(buffer.get("country_id"), Some(&json!(1)));
        assert_eq!(buffer.get("id"), Some(&json!(1)));
        assert!(!buffer.has("population"), "undeclared fields stay out");
        assert!(buffer.is_root());
    });
}

#[test]
fn country_edit_round_trip() {
    with_session(|session, fixture| {
        session.edit("country", &RecordId::Int(1)).unwrap();
        assert_eq!(session.buffer().meta().active_context, "country");
        assert_eq!(session.buffer().meta().active_id, Some(RecordId::Int(1)));
        assert_eq!(
            session.buffer().get_path("country.name"),
            Some(&json!("Germany"))
        );

        session
            .updated("country.name", json!("Deutschland"))
            .unwrap();
        session.save().unwrap();

        let country = fixture.record("country", 1);
        assert_eq!(country.get("name"), Some(&json!("Deutschland")));
        let city = fixture.record("city", 1);
        assert_eq!(city.get("name"), Some(&json!("Berlin")), "root untouched");
        assert!(session.buffer().is_root(), "context reset after save");
    });
}

#[test]
fn only_one_relation_slice_at_a_time() {
    with_session(|session, _| {
        session.edit("country", &RecordId::Int(1)).unwrap();
        assert!(session.buffer().has("country"));

        session.add("notes").unwrap();
        assert!(session.buffer().has("notes"));
        assert!(!session.buffer().has("country"));
        assert_eq!(session.buffer().meta().active_id, None);
    });
}

#[test]
fn missing_records_degrade_instead_of_erroring() {
    with_session(|session, _| {
        session.edit("country", &RecordId::Int(99)).unwrap();
        assert!(!session.buffer().has("country"));
        assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));

        session.reload_model(&RecordId::Int(77)).unwrap();
        assert!(session.buffer().all().is_empty());
        assert_eq!(
            session.buffer().meta().root_type.as_deref(),
            Some("city"),
            "metadata survives"
        );
    });
}

#[test]
fn belongs_to_retarget_through_auto_save() {
    with_session(|session, fixture| {
        session.set_auto_save(true);
        session.edit("country", &RecordId::Int(1)).unwrap();

        let update = session.updated("country.id", json!(2)).unwrap();
        assert!(update.saved);
        assert_eq!(update.id, Some(RecordId::Int(2)));

        assert_eq!(session.buffer().meta().active_id, Some(RecordId::Int(2)));
        let city = fixture.record("city", 1);
        assert_eq!(city.get("country_id"), Some(&json!(2)));
        assert_eq!(
            session.buffer().get_path("country.name"),
            Some(&json!("France")),
            "buffered slice reflects the new target"
        );
    });
}

#[test]
fn auto_save_gate_controls_persistence() {
    with_session(|session, fixture| {
        let events = session.subscribe();

        let off = session.updated("name", json!("Hamburg")).unwrap();
        assert!(!off.saved);
        assert_eq!(session.buffer().get("name"), Some(&json!("Hamburg")));
        assert_eq!(
            fixture.record("city", 1).get("name"),
            Some(&json!("Berlin"))
        );
        assert!(events.try_recv().is_err(), "no event without a write");
        assert!(session.has_unsaved_input());

        session.set_auto_save(true);
        let on = session.updated("name", json!("Hamburg")).unwrap();
        assert!(on.saved);
        assert_eq!(
            fixture.record("city", 1).get("name"),
            Some(&json!("Hamburg"))
        );
        assert!(matches!(
            events.recv().unwrap(),
            FormEvent::FieldUpdated { .. }
        ));
    });
}

#[test]
fn has_many_child_lifecycle() {
    with_session(|session, fixture| {
        session.add("notes").unwrap();
        session.updated("notes.body", json!("new note")).unwrap();
        session.save().unwrap();

        assert_eq!(fixture.store.count("note").unwrap(), 2);
        let note = fixture.record("note", 2);
        assert_eq!(note.get("body"), Some(&json!("new note")));
        assert_eq!(note.get("city_id"), Some(&json!(1)), "back-pointer set");

        session.delete("notes", &RecordId::Int(2)).unwrap();
        assert_eq!(fixture.store.count("note").unwrap(), 1);
    });
}

#[test]
fn morph_many_child_lifecycle() {
    with_session(|session, fixture| {
        session.add("tags").unwrap();
        session.updated("tags.label", json!("capital")).unwrap();
        session.save().unwrap();

        assert_eq!(fixture.store.count("tag").unwrap(), 1);
        let tag = fixture.record("tag", 1);
        assert_eq!(tag.get("label"), Some(&json!("capital")));
        assert_eq!(tag.get("taggable_id"), Some(&json!(1)));
        assert_eq!(tag.get("taggable_type"), Some(&json!("city")));

        session.delete("tags", &RecordId::Int(1)).unwrap();
        assert_eq!(fixture.store.count("tag").unwrap(), 0);
    });
}

#[test]
fn belongs_to_many_attach_and_pivot_update() {
    with_session(|session, fixture| {
        // Select the existing Bosch record instead of creating one.
        session.add("brands").unwrap();
        session.updated("brands.id", json!(2)).unwrap();
        session.save().unwrap();

        let city = fixture.record("city", 1);
        let brands = fixture.store.relation("city", "brands").unwrap().unwrap();
        assert!(fixture
            .store
            .pivot_row(&city, &brands, &RecordId::Int(2))
            .is_some());

        session.set_auto_save(true);
        session.edit("brands", &RecordId::Int(2)).unwrap();
        let update = session
            .updated("brands.pivot.status", json!("5"))
            .unwrap();
        assert!(update.saved);
        let pivot = fixture
            .store
            .pivot_row(&city, &brands, &RecordId::Int(2))
            .unwrap();
        assert_eq!(pivot.get("status"), Some(&json!(5)), "coerced to integer");
    });
}

#[test]
fn delete_detaches_members_and_dissociates_targets() {
    with_session(|session, fixture| {
        session.delete("brands", &RecordId::Int(1)).unwrap();
        assert_eq!(fixture.store.count("brand").unwrap(), 2, "member survives");
        let city = fixture.record("city", 1);
        let brands = fixture.store.relation("city", "brands").unwrap().unwrap();
        assert!(fixture
            .store
            .pivot_row(&city, &brands, &RecordId::Int(1))
            .is_none());

        session.delete("country", &RecordId::Int(1)).unwrap();
        assert_eq!(fixture.store.count("country").unwrap(), 2, "target survives");
        let city = fixture.record("city", 1);
        assert_eq!(city.get("country_id"), Some(&json!(null)));
    });
}

#[test]
fn deleting_the_edited_relation_record_drops_back_to_root() {
    with_session(|session, _| {
        session.edit("notes", &RecordId::Int(1)).unwrap();
        session.delete("notes", &RecordId::Int(1)).unwrap();
        assert!(session.buffer().is_root());
        assert!(!session.buffer().has("notes"));
    });
}

#[test]
fn create_mode_persists_a_new_root() {
    let fixture = TravelFixture::new();
    let mut session = fixture.create_session();
    assert_eq!(session.buffer().meta().root_id, None);

    session.updated("name", json!("Munich")).unwrap();
    session.updated("status", json!("in_review")).unwrap();
    session.save().unwrap();

    assert_eq!(session.buffer().meta().root_id, Some(RecordId::Int(2)));
    assert_eq!(fixture.store.count("city").unwrap(), 2);
    let munich = fixture.record("city", 2);
    assert_eq!(munich.get("name"), Some(&json!("Munich")));
}

#[test]
fn nullable_fields_coerce_empty_input() {
    with_session(|session, fixture| {
        session.set_auto_save(true);
        let update = session.updated("motto", json!("   ")).unwrap();
        assert_eq!(update.clean_value, json!(null));
        assert_eq!(fixture.record("city", 1).get("motto"), Some(&json!(null)));
    });
}

#[test]
fn relation_guards_apply_before_lookups() {
    with_session(|session, _| {
        let err = session.edit("suppliers", &RecordId::Int(1)).unwrap_err();
        assert!(matches!(err, FormError::RelationNotAllowed { .. }));

        let err = session.relation_options("suppliers", "name").unwrap_err();
        assert!(matches!(err, FormError::RelationNotAllowed { .. }));

        let err = session.updated("suppliers.name", json!("x")).unwrap_err();
        assert!(matches!(err, FormError::FieldNotDeclared { .. }));
    });
}

#[test]
fn option_listings() {
    with_session(|session, _| {
        let countries = session.relation_options("country", "name").unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0].label, "Germany");
        assert_eq!(countries[0].value, json!(1));

        let masked = session
            .relation_options_masked("country", "(name) [(code)]")
            .unwrap();
        assert_eq!(masked[1].label, "France [FR]");

        let statuses = session.enum_options("status").unwrap();
        assert_eq!(statuses[1].label, "In Review");
        assert_eq!(statuses[1].value, json!("in_review"));
    });
}

#[test]
fn relation_list_projects_declared_columns() {
    with_session(|session, _| {
        let brands = session.relation_list("brands").unwrap();
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].get("name"), Some(&json!("Acme")));
        assert_eq!(brands[0].get("id"), Some(&json!(1)));
        assert_eq!(
            brands[0].get("pivot"),
            Some(&json!({"status": 1})),
            "pivot columns ride along"
        );

        let notes = session.relation_list("notes").unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get("body"), Some(&json!("remember the wall")));
    });
}

#[test]
fn cancel_discards_unsaved_relation_edits() {
    with_session(|session, _| {
        session.edit("country", &RecordId::Int(1)).unwrap();
        session.updated("country.name", json!("draft")).unwrap();
        session.cancel().unwrap();

        assert!(session.buffer().is_root());
        assert!(!session.buffer().has("country"));
        assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
    });
}

#[test]
fn save_emits_saved_events() {
    with_session(|session, _| {
        let events = session.subscribe();
        session.updated("name", json!("Hamburg")).unwrap();
        session.save().unwrap();
        match events.recv().unwrap() {
            FormEvent::Saved { context, id } => {
                assert_eq!(context, "");
                assert_eq!(id, Some(RecordId::Int(1)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    });
}
