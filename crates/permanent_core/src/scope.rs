//! Query scope layer.
//!
//! # Responsibility
//! - Expose the `not_deleted` and `deleted` views over any record type.
//! - Apply the default scope to ordinary identity lookups.
//! - Resolve association accessors through their declared visibility.
//!
//! # Invariants
//! - `not_deleted` and `deleted` partition a type's rows.
//! - No cascade logic lives here; this is a filter over the record store.

use crate::error::LifecycleResult;
use crate::model::association::{Cardinality, Visibility};
use crate::model::record::{LiveRecord, RecordId};
use crate::registry::AssociationRegistry;
use crate::repo::record_repo::{RecordQuery, RecordStore};

/// Deletion filter applied to a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryScope {
    /// `deleted_at IS NULL`.
    #[default]
    NotDeleted,
    /// `deleted_at IS NOT NULL`.
    Deleted,
    /// No deletion filter.
    Unscoped,
}

impl QueryScope {
    /// Scope an association accessor reads through.
    pub fn for_visibility(visibility: Visibility) -> Self {
        match visibility {
            Visibility::DefaultScoped => Self::NotDeleted,
            Visibility::Explicit => Self::Unscoped,
        }
    }
}

/// Scoped read API over one store and registry.
pub struct ScopedQueries<'a, S: RecordStore> {
    store: &'a S,
    registry: &'a AssociationRegistry,
}

impl<'a, S: RecordStore> ScopedQueries<'a, S> {
    pub fn new(store: &'a S, registry: &'a AssociationRegistry) -> Self {
        Self { store, registry }
    }

    /// Active records of `type_name` in insertion order.
    pub fn not_deleted(&self, type_name: &str) -> LifecycleResult<Vec<LiveRecord>> {
        self.list(type_name, QueryScope::NotDeleted)
    }

    /// Soft-deleted records of `type_name` in insertion order.
    pub fn deleted(&self, type_name: &str) -> LifecycleResult<Vec<LiveRecord>> {
        self.list(type_name, QueryScope::Deleted)
    }

    pub fn count_not_deleted(&self, type_name: &str) -> LifecycleResult<u64> {
        self.count(type_name, QueryScope::NotDeleted)
    }

    pub fn count_deleted(&self, type_name: &str) -> LifecycleResult<u64> {
        self.count(type_name, QueryScope::Deleted)
    }

    /// Counts every stored row, deleted or not.
    pub fn count_all(&self, type_name: &str) -> LifecycleResult<u64> {
        self.count(type_name, QueryScope::Unscoped)
    }

    /// Ordinary lookup: hides soft-deleted rows of default-scoped types.
    pub fn find_by_id(&self, type_name: &str, id: RecordId) -> LifecycleResult<Option<LiveRecord>> {
        let scope = self.default_scope_for(type_name)?;
        self.find(type_name, id, scope)
    }

    /// Lookup that bypasses the default scope.
    pub fn find_unscoped(
        &self,
        type_name: &str,
        id: RecordId,
    ) -> LifecycleResult<Option<LiveRecord>> {
        self.find(type_name, id, QueryScope::Unscoped)
    }

    /// Scope applied by `find_by_id` for `type_name`.
    pub fn default_scope_for(&self, type_name: &str) -> LifecycleResult<QueryScope> {
        let descriptor = self.registry.descriptor(type_name)?;
        Ok(if descriptor.default_scoped {
            QueryScope::NotDeleted
        } else {
            QueryScope::Unscoped
        })
    }

    /// Association accessor honoring the association's visibility.
    pub fn dependents(
        &self,
        owner: &LiveRecord,
        target_type: &str,
    ) -> LifecycleResult<Vec<LiveRecord>> {
        let association = self.registry.association(owner.type_name(), target_type)?;
        let mut query =
            RecordQuery::dependents_of(owner.id(), QueryScope::for_visibility(association.visibility));
        if association.cardinality == Cardinality::One {
            query.limit = Some(1);
        }
        Ok(self
            .store
            .query(target_type, &query)?
            .into_iter()
            .map(LiveRecord::loaded)
            .collect())
    }

    fn find(
        &self,
        type_name: &str,
        id: RecordId,
        scope: QueryScope,
    ) -> LifecycleResult<Option<LiveRecord>> {
        self.registry.descriptor(type_name)?;
        Ok(self
            .store
            .find_by_id(type_name, id, scope)?
            .map(LiveRecord::loaded))
    }

    fn list(&self, type_name: &str, scope: QueryScope) -> LifecycleResult<Vec<LiveRecord>> {
        self.registry.descriptor(type_name)?;
        Ok(self
            .store
            .query(type_name, &RecordQuery::scoped(scope))?
            .into_iter()
            .map(LiveRecord::loaded)
            .collect())
    }

    fn count(&self, type_name: &str, scope: QueryScope) -> LifecycleResult<u64> {
        self.registry.descriptor(type_name)?;
        Ok(self.store.count(type_name, &RecordQuery::scoped(scope))?)
    }
}
