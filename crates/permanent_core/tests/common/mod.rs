//! Shared burrow fixture: one hole with every kind of dependent.

#![allow(dead_code)]

use permanent_core::{
    define_record_table, AssociationRegistry, Capability, Cardinality, LifecycleConfig,
    LifecycleService, LiveRecord, Record, RecordValidator, SqliteRecordStore, Visibility,
};
use rusqlite::Connection;

pub type BurrowService<'conn, V> = LifecycleService<SqliteRecordStore<'conn>, V>;

const TYPES: &[(&str, Capability, bool)] = &[
    ("dirt", Capability::SoftDeletable, false),
    ("earthworm", Capability::SoftDeletable, false),
    ("hole", Capability::SoftDeletable, false),
    ("muskrat", Capability::SoftDeletable, false),
    ("mole", Capability::HardOnly, false),
    ("location", Capability::SoftDeletable, false),
    ("difficulty", Capability::SoftDeletable, true),
    ("comment", Capability::SoftDeletable, true),
    ("kitty", Capability::HardOnly, false),
];

const ASSOCIATIONS: &[(&str, &str, Cardinality, Capability, Visibility)] = &[
    ("dirt", "earthworm", Cardinality::One, Capability::SoftDeletable, Visibility::Explicit),
    ("dirt", "hole", Cardinality::One, Capability::SoftDeletable, Visibility::Explicit),
    ("hole", "muskrat", Cardinality::Many, Capability::SoftDeletable, Visibility::Explicit),
    ("hole", "mole", Cardinality::Many, Capability::HardOnly, Visibility::Explicit),
    ("hole", "location", Cardinality::One, Capability::SoftDeletable, Visibility::Explicit),
    ("hole", "difficulty", Cardinality::One, Capability::SoftDeletable, Visibility::DefaultScoped),
    ("hole", "comment", Cardinality::Many, Capability::SoftDeletable, Visibility::DefaultScoped),
];

pub fn define_burrow_tables(conn: &Connection) {
    for (name, capability, _) in TYPES {
        define_record_table(conn, name, *capability).unwrap();
    }
}

pub fn burrow_registry() -> AssociationRegistry {
    let mut registry = AssociationRegistry::new();
    for (name, capability, default_scoped) in TYPES {
        registry
            .declare_type(name, *capability, *default_scoped)
            .unwrap();
    }
    for (owner, target, cardinality, capability, visibility) in ASSOCIATIONS {
        registry
            .declare_association(owner, target, *cardinality, *capability, *visibility)
            .unwrap();
    }
    registry
}

pub fn burrow_service(conn: &Connection) -> BurrowService<'_, permanent_core::NoValidation> {
    define_burrow_tables(conn);
    let store = SqliteRecordStore::try_new(conn).unwrap();
    LifecycleService::try_new(store, burrow_registry()).unwrap()
}

pub fn burrow_service_with<V: RecordValidator>(
    conn: &Connection,
    validator: V,
) -> BurrowService<'_, V> {
    define_burrow_tables(conn);
    let store = SqliteRecordStore::try_new(conn).unwrap();
    LifecycleService::with_validator(
        store,
        burrow_registry(),
        validator,
        LifecycleConfig::default(),
    )
    .unwrap()
}

pub struct Burrow {
    pub dirt: LiveRecord,
    pub earthworm: LiveRecord,
    pub hole: LiveRecord,
    pub muskrat: LiveRecord,
    pub mole: LiveRecord,
    pub location: LiveRecord,
    pub difficulty: LiveRecord,
    pub comments: Vec<LiveRecord>,
    pub kitty: LiveRecord,
}

pub fn seed_burrow<V: RecordValidator>(service: &BurrowService<'_, V>) -> Burrow {
    let dirt = service.create(Record::new("dirt")).unwrap();
    let earthworm = service.create_dependent(&dirt, "earthworm").unwrap();
    let hole = service
        .create(Record::owned_by("hole", dirt.id()).with_attribute("name", "burrow"))
        .unwrap();
    let muskrat = service.create_dependent(&hole, "muskrat").unwrap();
    let mole = service.create_dependent(&hole, "mole").unwrap();
    let location = service.create_dependent(&hole, "location").unwrap();
    let difficulty = service.create_dependent(&hole, "difficulty").unwrap();
    let comments = (0..2)
        .map(|_| service.create_dependent(&hole, "comment").unwrap())
        .collect();
    let kitty = service.create(Record::new("kitty")).unwrap();

    Burrow {
        dirt,
        earthworm,
        hole,
        muskrat,
        mole,
        location,
        difficulty,
        comments,
        kitty,
    }
}

/// Reloads a handle unscoped; panics when the row is gone.
pub fn reload<V: RecordValidator>(service: &BurrowService<'_, V>, record: &LiveRecord) -> LiveRecord {
    service.reload(record).unwrap().unwrap()
}

pub fn count_all<V: RecordValidator>(service: &BurrowService<'_, V>, type_name: &str) -> u64 {
    service.scopes().count_all(type_name).unwrap()
}
