//! Storage collaborator contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the record store contract the lifecycle engine calls into.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `UnknownType`) in
//!   addition to DB transport errors.
//! - Query results follow insertion order.

pub mod record_repo;
