//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `permanent_core` linkage with a deterministic destroy/revive run
//!   against an in-memory database.
//! - Optionally read a JSON `CoreConfig` from the first argument.

use permanent_core::db::open_db_in_memory_with;
use permanent_core::{
    core_version, define_record_table, init_logging, AssociationRegistry, Capability, Cardinality,
    CoreConfig, LifecycleService, Record, SqliteRecordStore, Visibility,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("permanent_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoreConfig::default(),
    };
    if config.logging.log_dir.is_some() {
        init_logging(&config.logging)?;
    }

    println!("permanent_core version={}", core_version());

    let conn = open_db_in_memory_with(&config.store)?;
    let mut registry = AssociationRegistry::new();
    for (name, capability, default_scoped) in [
        ("hole", Capability::SoftDeletable, false),
        ("comment", Capability::SoftDeletable, true),
        ("mole", Capability::HardOnly, false),
    ] {
        define_record_table(&conn, name, capability)?;
        registry.declare_type(name, capability, default_scoped)?;
    }
    registry.declare_association(
        "hole",
        "comment",
        Cardinality::Many,
        Capability::SoftDeletable,
        Visibility::DefaultScoped,
    )?;
    registry.declare_association(
        "hole",
        "mole",
        Cardinality::Many,
        Capability::HardOnly,
        Visibility::Explicit,
    )?;

    let store = SqliteRecordStore::try_new(&conn)?;
    let service = LifecycleService::with_validator(
        store,
        registry,
        permanent_core::NoValidation,
        config.lifecycle.clone(),
    )?;
    let mut hole = service.create(Record::new("hole"))?;
    service.create_dependent(&hole, "comment")?;
    service.create_dependent(&hole, "comment")?;
    service.create_dependent(&hole, "mole")?;

    service.destroy(&mut hole, false)?;
    print_counts(&service, "after destroy")?;
    service.revive(&mut hole)?;
    print_counts(&service, "after revive")?;
    Ok(())
}

fn print_counts(
    service: &LifecycleService<SqliteRecordStore<'_>>,
    label: &str,
) -> Result<(), Box<dyn Error>> {
    let scopes = service.scopes();
    println!(
        "{label}: holes deleted={} comments not_deleted={} deleted={} moles={}",
        scopes.count_deleted("hole")?,
        scopes.count_not_deleted("comment")?,
        scopes.count_deleted("comment")?,
        scopes.count_all("mole")?,
    );
    Ok(())
}
