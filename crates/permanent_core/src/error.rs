//! Lifecycle engine error umbrella.

use crate::model::record::RecordId;
use crate::registry::ConfigurationError;
use crate::repo::record_repo::StoreError;
use crate::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors surfaced by `destroy`, `revive` and the scope layer.
#[derive(Debug)]
pub enum LifecycleError {
    Validation(ValidationError),
    Configuration(ConfigurationError),
    /// Storage failures pass through unchanged.
    Store(StoreError),
    /// Handle is frozen by a soft delete; revive it first.
    Frozen(RecordId),
    /// Handle represents a physically removed row.
    Removed(RecordId),
    NotSoftDeletable(String),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Configuration(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Frozen(id) => write!(f, "record {id} is frozen until revived"),
            Self::Removed(id) => write!(f, "record {id} was physically removed"),
            Self::NotSoftDeletable(type_name) => {
                write!(f, "record type {type_name} does not support soft deletion")
            }
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Configuration(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Frozen(_) => None,
            Self::Removed(_) => None,
            Self::NotSoftDeletable(_) => None,
        }
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConfigurationError> for LifecycleError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
