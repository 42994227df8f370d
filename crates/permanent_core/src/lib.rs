//! Soft deletion with cascading lifecycle propagation.
//!
//! Records are marked deleted through a `deleted_at` timestamp, revived, or
//! physically removed; both directions propagate across declared
//! associations.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod scope;
pub mod service;
pub mod validation;

pub use config::{ConfigError, CoreConfig, LifecycleConfig, LoggingConfig, StoreConfig};
pub use db::tables::define_record_table;
pub use error::{LifecycleError, LifecycleResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::association::{Association, Capability, Cardinality, TypeDescriptor, Visibility};
pub use model::record::{LifecycleState, LiveRecord, Record, RecordId, Timestamp};
pub use registry::{AssociationRegistry, ConfigurationError};
pub use repo::record_repo::{RecordQuery, RecordStore, SqliteRecordStore, StoreError, StoreResult};
pub use scope::{QueryScope, ScopedQueries};
pub use service::lifecycle_service::{LifecycleService, ReviveOptions};
pub use validation::{
    NoValidation, RecordValidator, RequiredAttributes, ValidationError, ValidationFailure,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
