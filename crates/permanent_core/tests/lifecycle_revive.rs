mod common;

use common::{burrow_service, burrow_service_with, count_all, reload, seed_burrow};
use permanent_core::db::open_db_in_memory;
use permanent_core::{
    LifecycleError, LifecycleState, Record, RecordStore, RecordValidator, RequiredAttributes,
    ReviveOptions, Timestamp, ValidationFailure,
};

struct RejectEverything;

impl RecordValidator for RejectEverything {
    fn validate(&self, _record: &Record) -> Vec<ValidationFailure> {
        vec![ValidationFailure::new("base", "is not revivable")]
    }
}

#[test]
fn revive_returns_the_same_handle_active_and_unfrozen() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    assert!(burrow.hole.is_frozen());
    let hole_id = burrow.hole.id();

    let revived = service.revive(&mut burrow.hole).unwrap();

    assert_eq!(revived.id(), hole_id);
    assert!(!revived.is_frozen());
    assert!(!revived.is_deleted());
    assert_eq!(revived.deleted_at(), None);
    assert_eq!(revived.state(), LifecycleState::Active);
    assert_eq!(reload(&service, &burrow.hole).deleted_at(), None);
}

#[test]
fn revive_with_failing_validation_raises_and_keeps_deleted_at() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service_with(&conn, RejectEverything);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    let deleted_at = burrow.hole.deleted_at();

    let err = service.revive(&mut burrow.hole).unwrap_err();

    match err {
        LifecycleError::Validation(validation) => {
            assert_eq!(validation.record_id, burrow.hole.id());
            assert_eq!(validation.failures.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(burrow.hole.deleted_at(), deleted_at);
    assert!(burrow.hole.is_frozen());
    assert_eq!(reload(&service, &burrow.hole).deleted_at(), deleted_at);
    assert!(reload(&service, &burrow.muskrat).is_deleted());
}

#[test]
fn revive_can_skip_validation_per_call() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service_with(&conn, RejectEverything);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();

    service
        .revive_with(&mut burrow.hole, ReviveOptions { validate: false })
        .unwrap();

    assert!(!burrow.hole.is_deleted());
    assert!(!reload(&service, &burrow.muskrat).is_deleted());
}

#[test]
fn invalid_dependent_aborts_the_whole_revival() {
    let conn = open_db_in_memory().unwrap();
    let validator = RequiredAttributes::new().require("location", "address");
    let service = burrow_service_with(&conn, validator);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    let deleted_at = burrow.hole.deleted_at();

    let err = service.revive(&mut burrow.hole).unwrap_err();

    assert!(matches!(err, LifecycleError::Validation(ref v) if v.type_name == "location"));
    assert_eq!(burrow.hole.deleted_at(), deleted_at);
    assert!(burrow.hole.is_frozen());
    assert_eq!(reload(&service, &burrow.hole).deleted_at(), deleted_at);
    assert!(reload(&service, &burrow.muskrat).is_deleted());
}

#[test]
fn revive_restores_soft_deletable_dependents() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    let muskrats_before = count_all(&service, "muskrat");

    service.revive(&mut burrow.hole).unwrap();

    assert_eq!(count_all(&service, "muskrat"), muskrats_before);
    assert!(!reload(&service, &burrow.muskrat).is_deleted());
    assert!(!reload(&service, &burrow.location).is_deleted());
}

#[test]
fn revive_leaves_independently_deleted_dependents_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    let two_minutes_ago = Timestamp::now().minus_micros(120_000_000);
    let mut muskrat = reload(&service, &burrow.muskrat).into_record();
    muskrat.deleted_at = Some(two_minutes_ago);
    service.store().update(&muskrat).unwrap();

    service.revive(&mut burrow.hole).unwrap();

    assert_eq!(
        reload(&service, &burrow.muskrat).deleted_at(),
        Some(two_minutes_ago)
    );
    assert!(!reload(&service, &burrow.location).is_deleted());
}

#[test]
fn independence_rule_applies_at_every_level() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.muskrat, false).unwrap();
    let muskrat_deleted_at = burrow.muskrat.deleted_at();
    service.destroy(&mut burrow.dirt, false).unwrap();

    service.revive(&mut burrow.dirt).unwrap();

    assert!(!reload(&service, &burrow.hole).is_deleted());
    assert!(!reload(&service, &burrow.earthworm).is_deleted());
    assert!(!reload(&service, &burrow.location).is_deleted());
    assert_eq!(
        reload(&service, &burrow.muskrat).deleted_at(),
        muskrat_deleted_at
    );
}

#[test]
fn revive_does_not_restore_hard_deleted_dependents() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();
    let moles_after_destroy = count_all(&service, "mole");

    service.revive(&mut burrow.hole).unwrap();

    assert_eq!(count_all(&service, "mole"), moles_after_destroy);
    assert!(service.reload(&burrow.mole).unwrap().is_none());
}

#[test]
fn revive_makes_default_scoped_dependents_findable_again() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.hole, false).unwrap();

    service.revive(&mut burrow.hole).unwrap();

    let scopes = service.scopes();
    assert_eq!(scopes.dependents(&burrow.hole, "comment").unwrap().len(), 2);
    for comment in &burrow.comments {
        let found = scopes.find_by_id("comment", comment.id()).unwrap().unwrap();
        assert_eq!(found.record(), comment.record());
    }
    let difficulty = scopes
        .find_by_id("difficulty", burrow.difficulty.id())
        .unwrap()
        .unwrap();
    assert_eq!(difficulty.record(), burrow.difficulty.record());
}

#[test]
fn reviving_an_active_record_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    let mut comment = burrow.comments[0].clone();
    service.destroy(&mut comment, false).unwrap();

    service.revive(&mut burrow.hole).unwrap();

    assert_eq!(burrow.hole.state(), LifecycleState::Active);
    assert!(reload(&service, &comment).is_deleted());
}

#[test]
fn reviving_hard_only_or_removed_records_fails() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);

    let err = service.revive(&mut burrow.kitty).unwrap_err();
    assert!(matches!(err, LifecycleError::NotSoftDeletable(ref name) if name == "kitty"));

    service.destroy(&mut burrow.hole, true).unwrap();
    let err = service.revive(&mut burrow.hole).unwrap_err();
    assert!(matches!(err, LifecycleError::Removed(_)));
    assert_eq!(burrow.hole.state(), LifecycleState::HardDeleted);
}

#[test]
fn revive_restores_the_replacement_but_not_the_independently_deleted_row() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    service.destroy(&mut burrow.difficulty, false).unwrap();
    let first_deleted_at = burrow.difficulty.deleted_at();
    let replacement = service.create_dependent(&burrow.hole, "difficulty").unwrap();
    service.destroy(&mut burrow.hole, false).unwrap();

    service.revive(&mut burrow.hole).unwrap();

    assert!(!reload(&service, &replacement).is_deleted());
    assert_eq!(
        reload(&service, &burrow.difficulty).deleted_at(),
        first_deleted_at
    );
    let visible = service.scopes().dependents(&burrow.hole, "difficulty").unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), replacement.id());
}

#[test]
fn reviving_a_stale_handle_uses_the_stored_marker() {
    let conn = open_db_in_memory().unwrap();
    let service = burrow_service(&conn);
    let mut burrow = seed_burrow(&service);
    let mut stale_hole = burrow.hole.clone();
    service.destroy(&mut burrow.dirt, false).unwrap();
    assert!(!stale_hole.is_deleted());

    service.revive(&mut stale_hole).unwrap();

    assert_eq!(stale_hole.state(), LifecycleState::Active);
    assert!(!stale_hole.is_frozen());
    assert!(!reload(&service, &burrow.hole).is_deleted());
    assert!(!reload(&service, &burrow.muskrat).is_deleted());
    assert!(!reload(&service, &burrow.location).is_deleted());
    assert!(reload(&service, &burrow.dirt).is_deleted());
}
