//! Record model and lifecycle state helpers.
//!
//! # Responsibility
//! - Define the persisted `Record` shape and its deletion marker.
//! - Provide the in-process `LiveRecord` handle that carries `frozen`.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `deleted_at` is the only persisted source of truth for soft deletion.
//! - `frozen` is never persisted; handles loaded from storage start unfrozen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for every persisted record.
pub type RecordId = Uuid;

/// Wall-clock instant with microsecond precision.
///
/// Stored as signed epoch microseconds so SQLite keeps ordering exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Captures the current system time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Converts a wall-clock time, saturating outside the `i64` range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let micros = time.duration_since(UNIX_EPOCH).map_or(0, |elapsed| {
            i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX)
        });
        Self(micros)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// Returns a timestamp shifted back by `micros`.
    pub fn minus_micros(self, micros: i64) -> Self {
        Self(self.0.saturating_sub(micros))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Persisted record shape.
///
/// One storage table per `type_name`; dependents point at their owner via
/// `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Registered type name; also selects the storage table.
    pub type_name: String,
    /// Owning record for association lookups. `None` for roots.
    pub owner_id: Option<RecordId>,
    /// Free-form attributes inspected by validators.
    pub attributes: BTreeMap<String, String>,
    /// Soft delete marker. Always `None` for hard-only types.
    pub deleted_at: Option<Timestamp>,
}

impl Record {
    /// Creates an active root record with a generated id.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            type_name: type_name.into(),
            owner_id: None,
            attributes: BTreeMap::new(),
            deleted_at: None,
        }
    }

    /// Creates an active record owned by `owner_id`.
    pub fn owned_by(type_name: impl Into<String>, owner_id: RecordId) -> Self {
        let mut record = Self::new(type_name);
        record.owner_id = Some(owner_id);
        record
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Derived lifecycle state of one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    SoftDeleted,
    /// Row physically removed. Terminal.
    HardDeleted,
}

/// In-process handle around a persisted record.
///
/// Carries the transient flags that must never reach storage. A handle is
/// scoped to the operation (or caller) that produced it; reloading from
/// storage yields a fresh, unfrozen handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRecord {
    record: Record,
    frozen: bool,
    removed: bool,
}

impl LiveRecord {
    /// Wraps a record freshly loaded from or inserted into storage.
    pub fn loaded(record: Record) -> Self {
        Self {
            record,
            frozen: false,
            removed: false,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    pub fn id(&self) -> RecordId {
        self.record.id
    }

    pub fn type_name(&self) -> &str {
        &self.record.type_name
    }

    pub fn deleted_at(&self) -> Option<Timestamp> {
        self.record.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.record.is_deleted()
    }

    /// Whether mutation is blocked until the record is revived.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn state(&self) -> LifecycleState {
        if self.removed {
            LifecycleState::HardDeleted
        } else if self.is_deleted() {
            LifecycleState::SoftDeleted
        } else {
            LifecycleState::Active
        }
    }

    /// Sets the deletion marker and freezes the handle.
    pub fn mark_deleted(&mut self, at: Timestamp) {
        self.record.deleted_at = Some(at);
        self.frozen = true;
    }

    /// Clears the deletion marker and unfreezes the handle.
    pub fn mark_revived(&mut self) {
        self.record.deleted_at = None;
        self.frozen = false;
    }

    /// Records that the backing row no longer exists.
    pub fn mark_removed(&mut self) {
        self.removed = true;
        self.frozen = true;
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.record.attributes
    }
}
