//! Cascade resolver.
//!
//! # Responsibility
//! - Walk a record's associations depth-first and apply the deletion or
//!   revival decision to every dependent.
//!
//! # Invariants
//! - One timestamp per operation: every soft delete in a cascade shares the
//!   owner's `at`.
//! - Hard-only dependents are removed whatever `force` says.
//! - Revival never touches dependents deleted before their owner.
//! - Dependents are enumerated unscoped, in insertion order, including
//!   extra rows stored under a `one` association.

use crate::error::{LifecycleError, LifecycleResult};
use crate::model::association::{Association, Capability};
use crate::model::record::{LiveRecord, RecordId, Timestamp};
use crate::registry::AssociationRegistry;
use crate::repo::record_repo::{RecordQuery, RecordStore, StoreError};
use crate::scope::QueryScope;
use crate::validation::{RecordValidator, ValidationError};
use log::debug;

/// Per-operation counters, logged by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CascadeStats {
    pub soft_deleted: u32,
    pub hard_removed: u32,
    pub revived: u32,
    /// Already-deleted records left alone by destroy, or independently
    /// deleted dependents left alone by revive.
    pub skipped: u32,
}

pub(crate) struct CascadeResolver<'a, S, V> {
    store: &'a S,
    registry: &'a AssociationRegistry,
    validator: &'a V,
    stats: CascadeStats,
}

impl<'a, S: RecordStore, V: RecordValidator> CascadeResolver<'a, S, V> {
    pub(crate) fn new(store: &'a S, registry: &'a AssociationRegistry, validator: &'a V) -> Self {
        Self {
            store,
            registry,
            validator,
            stats: CascadeStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> CascadeStats {
        self.stats
    }

    /// Aligns a caller's handle with the stored deletion marker.
    ///
    /// A handle loaded before an owner's cascade still reads active; acting
    /// on it would skip a revive or overwrite the cascade timestamp.
    pub(crate) fn refresh_marker(&self, record: &mut LiveRecord) -> LifecycleResult<()> {
        if record.is_removed() {
            return Ok(());
        }
        self.registry.descriptor(record.type_name())?;

        let stored = self
            .store
            .find_by_id(record.type_name(), record.id(), QueryScope::Unscoped)?
            .ok_or_else(|| StoreError::NotFound {
                type_name: record.type_name().to_string(),
                id: record.id(),
            })?;
        match stored.deleted_at {
            Some(at) if record.deleted_at() != Some(at) => record.mark_deleted(at),
            None if record.is_deleted() => record.mark_revived(),
            _ => {}
        }
        Ok(())
    }

    /// Soft-deletes or removes `record`, then cascades over its associations.
    pub(crate) fn destroy(
        &mut self,
        record: &mut LiveRecord,
        force: bool,
        at: Timestamp,
    ) -> LifecycleResult<()> {
        if record.is_removed() {
            return Err(LifecycleError::Removed(record.id()));
        }

        let descriptor = self.registry.descriptor(record.type_name())?;
        if force || !descriptor.is_soft_deletable() {
            return self.remove(record, force, at);
        }

        if let Some(deleted_at) = record.deleted_at() {
            // Keeps the earlier timestamp so revival can tell it apart.
            record.mark_deleted(deleted_at);
            self.stats.skipped += 1;
            return Ok(());
        }

        record.mark_deleted(at);
        self.store.update(record.record())?;
        self.stats.soft_deleted += 1;
        debug!(
            "event=record_soft_delete module=cascade type={} id={}",
            record.type_name(),
            record.id()
        );

        self.cascade_delete(record.id(), record.type_name(), false, at)
    }

    /// Revives `record` and every dependent deleted with or after it.
    pub(crate) fn revive(&mut self, record: &mut LiveRecord, validate: bool) -> LifecycleResult<()> {
        if record.is_removed() {
            return Err(LifecycleError::Removed(record.id()));
        }

        let descriptor = self.registry.descriptor(record.type_name())?;
        if !descriptor.is_soft_deletable() {
            return Err(LifecycleError::NotSoftDeletable(
                record.type_name().to_string(),
            ));
        }

        if validate {
            let failures = self.validator.validate(record.record());
            if !failures.is_empty() {
                return Err(ValidationError {
                    type_name: record.type_name().to_string(),
                    record_id: record.id(),
                    failures,
                }
                .into());
            }
        }

        let Some(deleted_at) = record.deleted_at() else {
            return Ok(());
        };

        record.mark_revived();
        self.store.update(record.record())?;
        self.stats.revived += 1;
        debug!(
            "event=record_revive module=cascade type={} id={}",
            record.type_name(),
            record.id()
        );

        self.cascade_revive(record.id(), record.type_name(), deleted_at, validate)
    }

    fn remove(&mut self, record: &mut LiveRecord, force: bool, at: Timestamp) -> LifecycleResult<()> {
        self.store.physically_remove(record.record())?;
        record.mark_removed();
        self.stats.hard_removed += 1;
        debug!(
            "event=record_remove module=cascade type={} id={}",
            record.type_name(),
            record.id()
        );

        self.cascade_delete(record.id(), record.type_name(), force, at)
    }

    fn cascade_delete(
        &mut self,
        owner_id: RecordId,
        owner_type: &str,
        force: bool,
        at: Timestamp,
    ) -> LifecycleResult<()> {
        let registry = self.registry;
        for association in registry.associations_of(owner_type)? {
            for mut dependent in self.load_dependents(owner_id, association)? {
                match association.target_capability {
                    Capability::HardOnly => self.remove(&mut dependent, force, at)?,
                    Capability::SoftDeletable => self.destroy(&mut dependent, force, at)?,
                }
            }
        }
        Ok(())
    }

    fn cascade_revive(
        &mut self,
        owner_id: RecordId,
        owner_type: &str,
        owner_deleted_at: Timestamp,
        validate: bool,
    ) -> LifecycleResult<()> {
        let registry = self.registry;
        for association in registry.associations_of(owner_type)? {
            if association.target_capability == Capability::HardOnly {
                continue;
            }

            for mut dependent in self.load_dependents(owner_id, association)? {
                match dependent.deleted_at() {
                    None => {}
                    Some(deleted_at) if deleted_at < owner_deleted_at => {
                        self.stats.skipped += 1;
                        debug!(
                            "event=record_revive_skip module=cascade type={} id={} reason=deleted_before_owner",
                            dependent.type_name(),
                            dependent.id()
                        );
                    }
                    Some(_) => self.revive(&mut dependent, validate)?,
                }
            }
        }
        Ok(())
    }

    fn load_dependents(
        &self,
        owner_id: RecordId,
        association: &Association,
    ) -> LifecycleResult<Vec<LiveRecord>> {
        // Every stored row, whatever the visibility or cardinality.
        let query = RecordQuery::dependents_of(owner_id, QueryScope::Unscoped);
        Ok(self
            .store
            .query(&association.target_type, &query)?
            .into_iter()
            .map(LiveRecord::loaded)
            .collect())
    }
}
