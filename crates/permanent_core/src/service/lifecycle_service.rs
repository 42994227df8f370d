//! Lifecycle engine entry points.
//!
//! # Responsibility
//! - Orchestrate `destroy` / `revive` on one record handle.
//! - Verify the registry against the storage schema at construction.
//! - Emit one metadata-only log event per operation.
//!
//! # Invariants
//! - The handle passed in is the handle returned, carrying post-operation
//!   state.
//! - Handles are re-read from storage before `destroy` / `revive` decide
//!   anything, so stale handles act on the stored deletion marker.
//! - A failed operation rolls back storage and restores the handle.
//! - Frozen or removed handles reject attribute updates.

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::model::association::Capability;
use crate::model::record::{LiveRecord, Record, Timestamp};
use crate::registry::{AssociationRegistry, ConfigurationError};
use crate::repo::record_repo::{RecordStore, StoreError};
use crate::scope::{QueryScope, ScopedQueries};
use crate::service::cascade::{CascadeResolver, CascadeStats};
use crate::validation::{NoValidation, RecordValidator};
use log::{error, info};
use std::time::Instant;

/// Per-call revive switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviveOptions {
    pub validate: bool,
}

impl Default for ReviveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Soft-delete lifecycle service over one record store.
pub struct LifecycleService<S: RecordStore, V: RecordValidator = NoValidation> {
    store: S,
    registry: AssociationRegistry,
    validator: V,
    config: LifecycleConfig,
}

impl<S: RecordStore> LifecycleService<S, NoValidation> {
    /// Creates a service that accepts every record on revive.
    pub fn try_new(store: S, registry: AssociationRegistry) -> LifecycleResult<Self> {
        Self::with_validator(store, registry, NoValidation, LifecycleConfig::default())
    }
}

impl<S: RecordStore, V: RecordValidator> LifecycleService<S, V> {
    /// Creates a service after checking every registered type against the
    /// store's schema.
    ///
    /// # Errors
    /// - `ConfigurationError::MissingTable` when a type has no storage.
    /// - `ConfigurationError::SchemaMismatch` when the registered capability
    ///   disagrees with the presence of `deleted_at`.
    pub fn with_validator(
        store: S,
        registry: AssociationRegistry,
        validator: V,
        config: LifecycleConfig,
    ) -> LifecycleResult<Self> {
        verify_schema(&store, &registry)?;
        info!(
            "event=lifecycle_init module=lifecycle status=ok types={} validate_on_revive={}",
            registry.len(),
            config.validate_on_revive
        );
        Ok(Self {
            store,
            registry,
            validator,
            config,
        })
    }

    pub fn registry(&self) -> &AssociationRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read API with `deleted` / `not_deleted` views and default lookups.
    pub fn scopes(&self) -> ScopedQueries<'_, S> {
        ScopedQueries::new(&self.store, &self.registry)
    }

    /// Inserts a new record of a registered type.
    pub fn create(&self, record: Record) -> LifecycleResult<LiveRecord> {
        self.registry.descriptor(&record.type_name)?;
        self.store.insert(&record)?;
        Ok(LiveRecord::loaded(record))
    }

    /// Inserts a new dependent of `owner` through a declared association.
    pub fn create_dependent(
        &self,
        owner: &LiveRecord,
        target_type: &str,
    ) -> LifecycleResult<LiveRecord> {
        if owner.is_removed() {
            return Err(LifecycleError::Removed(owner.id()));
        }
        self.registry.association(owner.type_name(), target_type)?;
        self.create(Record::owned_by(target_type, owner.id()))
    }

    /// Reloads the handle's row unscoped. `None` once physically removed.
    pub fn reload(&self, record: &LiveRecord) -> LifecycleResult<Option<LiveRecord>> {
        Ok(self
            .store
            .find_by_id(record.type_name(), record.id(), QueryScope::Unscoped)?
            .map(LiveRecord::loaded))
    }

    /// Sets attributes on a live, unfrozen record and persists them.
    pub fn update_attributes<'r, I, K, A>(
        &self,
        record: &'r mut LiveRecord,
        attributes: I,
    ) -> LifecycleResult<&'r mut LiveRecord>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<String>,
    {
        if record.is_removed() {
            return Err(LifecycleError::Removed(record.id()));
        }
        if record.is_frozen() {
            return Err(LifecycleError::Frozen(record.id()));
        }

        let mut updated = record.clone();
        for (key, value) in attributes {
            updated.attributes_mut().insert(key.into(), value.into());
        }
        self.store.update(updated.record())?;
        *record = updated;
        Ok(record)
    }

    /// Destroys `record`: soft delete for soft-deletable types unless
    /// `force`, physical removal otherwise, cascading to dependents.
    pub fn destroy<'r>(
        &self,
        record: &'r mut LiveRecord,
        force: bool,
    ) -> LifecycleResult<&'r mut LiveRecord> {
        let operation = Operation::start("record_destroy", force);
        let at = Timestamp::now();
        let snapshot = record.clone();
        let mut resolver = CascadeResolver::new(&self.store, &self.registry, &self.validator);

        let outcome = self
            .store
            .within_unit_of_work(|| {
                resolver.refresh_marker(record)?;
                resolver.destroy(record, force, at)
            });
        operation.finish(record, snapshot, outcome, resolver.stats())?;
        Ok(record)
    }

    /// Revives `record` using the configured validation default.
    pub fn revive<'r>(&self, record: &'r mut LiveRecord) -> LifecycleResult<&'r mut LiveRecord> {
        let options = ReviveOptions {
            validate: self.config.validate_on_revive,
        };
        self.revive_with(record, options)
    }

    /// Revives `record` and the dependents deleted by the same cascade.
    ///
    /// # Errors
    /// - `LifecycleError::Validation` before any state changes when the
    ///   record (or a revived dependent) fails validation.
    pub fn revive_with<'r>(
        &self,
        record: &'r mut LiveRecord,
        options: ReviveOptions,
    ) -> LifecycleResult<&'r mut LiveRecord> {
        let operation = Operation::start("record_revive", false);
        let snapshot = record.clone();
        let mut resolver = CascadeResolver::new(&self.store, &self.registry, &self.validator);

        let outcome = self
            .store
            .within_unit_of_work(|| {
                resolver.refresh_marker(record)?;
                resolver.revive(record, options.validate)
            });
        operation.finish(record, snapshot, outcome, resolver.stats())?;
        Ok(record)
    }
}

/// One logged engine call.
struct Operation {
    event: &'static str,
    force: bool,
    started_at: Instant,
}

impl Operation {
    fn start(event: &'static str, force: bool) -> Self {
        Self {
            event,
            force,
            started_at: Instant::now(),
        }
    }

    /// Logs the outcome; on failure restores the caller's handle.
    fn finish(
        self,
        record: &mut LiveRecord,
        snapshot: LiveRecord,
        outcome: LifecycleResult<()>,
        stats: CascadeStats,
    ) -> LifecycleResult<()> {
        match outcome {
            Ok(()) => {
                info!(
                    "event={} module=lifecycle status=ok type={} id={} force={} soft_deleted={} hard_removed={} revived={} skipped={} duration_ms={}",
                    self.event,
                    record.type_name(),
                    record.id(),
                    self.force,
                    stats.soft_deleted,
                    stats.hard_removed,
                    stats.revived,
                    stats.skipped,
                    self.started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                *record = snapshot;
                error!(
                    "event={} module=lifecycle status=error type={} id={} force={} duration_ms={} error_code={} error={}",
                    self.event,
                    record.type_name(),
                    record.id(),
                    self.force,
                    self.started_at.elapsed().as_millis(),
                    error_code(&err),
                    err
                );
                Err(err)
            }
        }
    }
}

fn verify_schema<S: RecordStore>(
    store: &S,
    registry: &AssociationRegistry,
) -> LifecycleResult<()> {
    for descriptor in registry.descriptors() {
        let has_marker = match store.has_deletion_marker(&descriptor.name) {
            Ok(has_marker) => has_marker,
            Err(StoreError::UnknownType(name)) => {
                return Err(ConfigurationError::MissingTable(name).into());
            }
            Err(err) => return Err(err.into()),
        };
        let introspected = if has_marker {
            Capability::SoftDeletable
        } else {
            Capability::HardOnly
        };
        if introspected != descriptor.capability {
            return Err(ConfigurationError::SchemaMismatch {
                type_name: descriptor.name.clone(),
                registered: descriptor.capability,
                introspected,
            }
            .into());
        }
    }
    Ok(())
}

fn error_code(err: &LifecycleError) -> &'static str {
    match err {
        LifecycleError::Validation(_) => "validation_failed",
        LifecycleError::Configuration(_) => "configuration_error",
        LifecycleError::Store(_) => "store_error",
        LifecycleError::Frozen(_) => "record_frozen",
        LifecycleError::Removed(_) => "record_removed",
        LifecycleError::NotSoftDeletable(_) => "not_soft_deletable",
    }
}
