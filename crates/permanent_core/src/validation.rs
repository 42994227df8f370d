//! Record validation contract used before revival.
//!
//! # Responsibility
//! - Define the validator collaborator consulted by `revive`.
//! - Provide the failure/error shapes surfaced to callers.
//!
//! # Invariants
//! - Validators are pure: they inspect a record and never mutate it.

use crate::model::record::{Record, RecordId};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One failed rule on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub attribute: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.attribute, self.message)
    }
}

/// Raised by `revive` when the record fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub type_name: String,
    pub record_id: RecordId,
    pub failures: Vec<ValidationFailure>,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let details = self
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{} record {} is invalid: {details}",
            self.type_name, self.record_id
        )
    }
}

impl Error for ValidationError {}

/// Validation collaborator.
pub trait RecordValidator {
    /// Returns every failed rule; empty means valid.
    fn validate(&self, record: &Record) -> Vec<ValidationFailure>;

    fn is_valid(&self, record: &Record) -> bool {
        self.validate(record).is_empty()
    }
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl RecordValidator for NoValidation {
    fn validate(&self, _record: &Record) -> Vec<ValidationFailure> {
        Vec::new()
    }
}

/// Requires non-blank attributes per record type.
#[derive(Debug, Clone, Default)]
pub struct RequiredAttributes {
    by_type: BTreeMap<String, Vec<String>>,
}

impl RequiredAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, type_name: &str, attribute: &str) -> Self {
        self.by_type
            .entry(type_name.to_string())
            .or_default()
            .push(attribute.to_string());
        self
    }
}

impl RecordValidator for RequiredAttributes {
    fn validate(&self, record: &Record) -> Vec<ValidationFailure> {
        let Some(required) = self.by_type.get(&record.type_name) else {
            return Vec::new();
        };
        required
            .iter()
            .filter(|attribute| {
                record
                    .attributes
                    .get(attribute.as_str())
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|attribute| ValidationFailure::new(attribute.as_str(), "can't be blank"))
            .collect()
    }
}
