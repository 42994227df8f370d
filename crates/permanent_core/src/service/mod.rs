//! Lifecycle use-case services.
//!
//! # Responsibility
//! - Expose `destroy` / `revive` entry points over a record store.
//! - Delegate graph traversal to the cascade resolver.
//!
//! # Invariants
//! - Every entry point runs inside one storage unit of work.
//! - Service layer remains storage-agnostic.

pub mod cascade;
pub mod lifecycle_service;
