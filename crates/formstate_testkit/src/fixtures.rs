//! Seeded stores and sessions for scenario tests.
//!
//! The travel-catalog domain covers every relationship kind the engine
//! dispatches on: a city belongs to a country, has many notes, belongs
//! to many brands (with a pivot status column) and morphs many tags.

use formstate_core::{FormSession, RuleCatalog};
use formstate_store::{
    EnumCast, MemoryStore, Record, RecordId, RecordStore, RelationDescriptor, TypeSchema,
};
use serde_json::json;
use std::sync::Arc;

/// A seeded in-memory store plus the city form's rule catalog.
///
/// Seeded rows: countries Germany (#1, code `DE`) and France (#2, code
/// `FR`); city Berlin (#1, pointing at Germany, status `active`, plus an
/// undeclared `population` attribute); brands Acme (#1, attached to
/// Berlin with pivot status `1`) and Bosch (#2, unattached); note #1 on
/// Berlin. No tags are seeded.
pub struct TravelFixture {
    /// The seeded store.
    pub store: Arc<MemoryStore>,
    /// The rule catalog of the city form.
    pub rules: RuleCatalog,
}

impl TravelFixture {
    /// Builds and seeds the fixture.
    pub fn new() -> Self {
        let store = MemoryStore::new();

        store.register_type(TypeSchema::new("country").fillable(["name", "code"]));
        store.register_type(
            TypeSchema::new("city")
                .fillable(["name", "motto", "country_id", "status"])
                .cast(
                    "status",
                    EnumCast::new("CityStatus")
                        .variant("ACTIVE", "active")
                        .variant("IN_REVIEW", "in_review"),
                ),
        );
        store.register_type(TypeSchema::new("brand").fillable(["name"]));
        store.register_type(TypeSchema::new("note").fillable(["body"]));
        store.register_type(TypeSchema::new("tag").fillable(["label"]));

        store.register_relation(
            "city",
            RelationDescriptor::belongs_to("country", "country", "country_id"),
        );
        store.register_relation(
            "city",
            RelationDescriptor::has_many("notes", "note", "city_id"),
        );
        store.register_relation(
            "city",
            RelationDescriptor::belongs_to_many("brands", "brand", ["status"]),
        );
        store.register_relation(
            "city",
            RelationDescriptor::morph_many("tags", "tag", "taggable_id", "taggable_type"),
        );

        store
            .seed(
                "country",
                [("name", json!("Germany")), ("code", json!("DE"))],
            )
            .expect("seed Germany");
        store
            .seed("country", [("name", json!("France")), ("code", json!("FR"))])
            .expect("seed France");
        let berlin = store
            .seed(
                "city",
                [
                    ("name", json!("Berlin")),
                    ("country_id", json!(1)),
                    ("status", json!("active")),
                    ("population", json!(3_700_000)),
                ],
            )
            .expect("seed Berlin");
        let acme = store
            .seed("brand", [("name", json!("Acme"))])
            .expect("seed Acme");
        store
            .seed("brand", [("name", json!("Bosch"))])
            .expect("seed Bosch");
        store
            .seed(
                "note",
                [("body", json!("remember the wall")), ("city_id", json!(1))],
            )
            .expect("seed note");

        let brands = store
            .relation("city", "brands")
            .expect("city type registered")
            .expect("brands relation registered");
        let mut pivot = formstate_store::FieldMap::new();
        pivot.insert("status".to_owned(), json!(1));
        store
            .attach(&berlin, &brands, acme.id().expect("Acme is saved"), pivot)
            .expect("attach Acme");

        Self {
            store: Arc::new(store),
            rules: city_rules(),
        }
    }

    /// Opens a session on Berlin.
    pub fn session(&self) -> FormSession {
        self.session_on(&RecordId::Int(1))
    }

    /// Opens a session on the city with the given id.
    pub fn session_on(&self, id: &RecordId) -> FormSession {
        let root = self
            .store
            .find("city", id)
            .expect("city type registered")
            .expect("city is seeded");
        self.open(&root)
    }

    /// Opens a session on a fresh, unsaved city (create mode).
    pub fn create_session(&self) -> FormSession {
        let root = self
            .store
            .new_instance("city")
            .expect("city type registered");
        self.open(&root)
    }

    /// Fetches a seeded record.
    pub fn record(&self, record_type: &str, id: i64) -> Record {
        self.store
            .find(record_type, &RecordId::Int(id))
            .expect("type registered")
            .expect("record is seeded")
    }

    fn open(&self, root: &Record) -> FormSession {
        FormSession::new(
            Arc::clone(&self.store) as Arc<dyn RecordStore>,
            self.rules.clone(),
            Some(root),
        )
        .expect("session opens")
    }
}

impl Default for TravelFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The rule catalog of the city form.
pub fn city_rules() -> RuleCatalog {
    RuleCatalog::new()
        .rule("name", "required|max:80")
        .rule("motto", "nullable|max:120")
        .rule("status", "required")
        .rule("country.id", "nullable|integer")
        .rule("country.name", "required")
        .rule("country.code", "nullable|max:2")
        .rule("notes.body", "required")
        .rule("brands.id", "nullable|integer")
        .rule("brands.name", "required")
        .rule("brands.pivot.status", "required|integer")
        .rule("tags.label", "required")
}

/// Runs a test against a session opened on the seeded Berlin record.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut FormSession, &TravelFixture) -> R,
{
    let fixture = TravelFixture::new();
    let mut session = fixture.session();
    f(&mut session, &fixture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_seeds_every_relation_kind() {
        let fixture = TravelFixture::new();
        for relation in ["country", "notes", "brands", "tags"] {
            assert!(fixture
                .store
                .relation("city", relation)
                .unwrap()
                .is_some());
        }
        assert_eq!(fixture.store.count("country").unwrap(), 2);
        assert_eq!(fixture.store.count("brand").unwrap(), 2);
        assert_eq!(fixture.store.count("note").unwrap(), 1);
    }

    #[test]
    fn session_opens_on_berlin() {
        let fixture = TravelFixture::new();
        let session = fixture.session();
        assert_eq!(session.buffer().get("name"), Some(&json!("Berlin")));
    }
}
