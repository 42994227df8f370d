//! Record and association domain model.
//!
//! # Responsibility
//! - Define the persisted record shape shared by every registered type.
//! - Keep in-process lifecycle state (`frozen`, removal) out of storage.
//! - Describe association edges as typed descriptors.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Soft deletion is represented by `deleted_at`, never by a flag column.

pub mod association;
pub mod record;
