//! Association and type descriptors.
//!
//! # Responsibility
//! - Describe how a record type participates in soft deletion.
//! - Describe each outgoing association edge the cascade resolver walks.
//!
//! # Invariants
//! - Descriptors are plain data; the registry owns consistency checks.

use serde::{Deserialize, Serialize};

/// How many dependents one owner may hold through an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Whether a record type carries the `deleted_at` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Type has `deleted_at`; destroy marks instead of removing.
    SoftDeletable,
    /// Type has no marker; every destroy removes the row.
    HardOnly,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftDeletable => "soft_deletable",
            Self::HardOnly => "hard_only",
        }
    }

    pub fn is_soft_deletable(self) -> bool {
        matches!(self, Self::SoftDeletable)
    }
}

/// Read path used by an association accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Accessor hides soft-deleted dependents.
    DefaultScoped,
    /// Accessor returns dependents regardless of deletion state.
    Explicit,
}

/// Registration of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub capability: Capability,
    /// Ordinary identity lookups hide soft-deleted rows.
    pub default_scoped: bool,
}

impl TypeDescriptor {
    pub fn is_soft_deletable(&self) -> bool {
        self.capability.is_soft_deletable()
    }
}

/// Declared edge from an owner type to a target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub owner_type: String,
    pub target_type: String,
    pub cardinality: Cardinality,
    pub target_capability: Capability,
    pub visibility: Visibility,
}
