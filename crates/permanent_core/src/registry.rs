//! Association metadata registry.
//!
//! # Responsibility
//! - Hold per-type capability tags and ordered outgoing associations.
//! - Reject inconsistent declarations at configuration time.
//!
//! # Invariants
//! - Association order per owner type is declaration order.
//! - An association's `target_capability` always matches the target type.
//! - Lookups of unregistered types fail with `ConfigurationError`.

use crate::model::association::{Association, Capability, Cardinality, TypeDescriptor, Visibility};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_TYPE_NAME_CHARS: usize = 48;

/// Registration/resolution errors. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    InvalidTypeName(String),
    DuplicateType(String),
    UnknownType(String),
    UnknownAssociation {
        owner_type: String,
        target_type: String,
    },
    DuplicateAssociation {
        owner_type: String,
        target_type: String,
    },
    CapabilityMismatch {
        target_type: String,
        declared: Capability,
        registered: Capability,
    },
    /// Default filtering needs a `deleted_at` column on the target.
    DefaultScopeOnHardOnly {
        owner_type: String,
        target_type: String,
    },
    MissingTable(String),
    SchemaMismatch {
        type_name: String,
        registered: Capability,
        introspected: Capability,
    },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => write!(f, "record type name is invalid: `{name}`"),
            Self::DuplicateType(name) => write!(f, "record type already registered: {name}"),
            Self::UnknownType(name) => write!(f, "record type not registered: {name}"),
            Self::UnknownAssociation {
                owner_type,
                target_type,
            } => write!(f, "association {owner_type} -> {target_type} not declared"),
            Self::DuplicateAssociation {
                owner_type,
                target_type,
            } => write!(
                f,
                "association {owner_type} -> {target_type} already declared"
            ),
            Self::CapabilityMismatch {
                target_type,
                declared,
                registered,
            } => write!(
                f,
                "association target {target_type} declared {} but registered {}",
                declared.as_str(),
                registered.as_str()
            ),
            Self::DefaultScopeOnHardOnly {
                owner_type,
                target_type,
            } => write!(
                f,
                "association {owner_type} -> {target_type} cannot be default-scoped: target is hard-only"
            ),
            Self::MissingTable(name) => write!(f, "no storage table for record type {name}"),
            Self::SchemaMismatch {
                type_name,
                registered,
                introspected,
            } => write!(
                f,
                "record type {type_name} registered {} but storage schema is {}",
                registered.as_str(),
                introspected.as_str()
            ),
        }
    }
}

impl Error for ConfigurationError {}

#[derive(Debug, Clone)]
struct TypeEntry {
    descriptor: TypeDescriptor,
    associations: Vec<Association>,
}

/// Static description of every record type and its outgoing associations.
///
/// Populated during configuration, then handed to the lifecycle service,
/// which only reads it.
#[derive(Debug, Clone, Default)]
pub struct AssociationRegistry {
    types: BTreeMap<String, TypeEntry>,
}

impl AssociationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one record type with its capability tag.
    pub fn declare_type(
        &mut self,
        name: &str,
        capability: Capability,
        default_scoped: bool,
    ) -> Result<(), ConfigurationError> {
        let name = name.trim();
        if !is_valid_type_name(name) {
            return Err(ConfigurationError::InvalidTypeName(name.to_string()));
        }
        if self.types.contains_key(name) {
            return Err(ConfigurationError::DuplicateType(name.to_string()));
        }
        if default_scoped && !capability.is_soft_deletable() {
            return Err(ConfigurationError::DefaultScopeOnHardOnly {
                owner_type: name.to_string(),
                target_type: name.to_string(),
            });
        }

        self.types.insert(
            name.to_string(),
            TypeEntry {
                descriptor: TypeDescriptor {
                    name: name.to_string(),
                    capability,
                    default_scoped,
                },
                associations: Vec::new(),
            },
        );
        Ok(())
    }

    /// Declares one association edge. Both ends must already be registered.
    pub fn declare_association(
        &mut self,
        owner_type: &str,
        target_type: &str,
        cardinality: Cardinality,
        target_capability: Capability,
        visibility: Visibility,
    ) -> Result<(), ConfigurationError> {
        let registered = self.descriptor(target_type)?.capability;
        if registered != target_capability {
            return Err(ConfigurationError::CapabilityMismatch {
                target_type: target_type.to_string(),
                declared: target_capability,
                registered,
            });
        }
        if visibility == Visibility::DefaultScoped && !target_capability.is_soft_deletable() {
            return Err(ConfigurationError::DefaultScopeOnHardOnly {
                owner_type: owner_type.to_string(),
                target_type: target_type.to_string(),
            });
        }

        let entry = self
            .types
            .get_mut(owner_type)
            .ok_or_else(|| ConfigurationError::UnknownType(owner_type.to_string()))?;
        if entry
            .associations
            .iter()
            .any(|existing| existing.target_type == target_type)
        {
            return Err(ConfigurationError::DuplicateAssociation {
                owner_type: owner_type.to_string(),
                target_type: target_type.to_string(),
            });
        }

        entry.associations.push(Association {
            owner_type: owner_type.to_string(),
            target_type: target_type.to_string(),
            cardinality,
            target_capability,
            visibility,
        });
        Ok(())
    }

    /// Returns outgoing associations of `type_name` in declaration order.
    pub fn associations_of(&self, type_name: &str) -> Result<&[Association], ConfigurationError> {
        self.entry(type_name)
            .map(|entry| entry.associations.as_slice())
    }

    /// Returns one association edge by owner and target type.
    pub fn association(
        &self,
        owner_type: &str,
        target_type: &str,
    ) -> Result<&Association, ConfigurationError> {
        self.associations_of(owner_type)?
            .iter()
            .find(|association| association.target_type == target_type)
            .ok_or_else(|| ConfigurationError::UnknownAssociation {
                owner_type: owner_type.to_string(),
                target_type: target_type.to_string(),
            })
    }

    pub fn descriptor(&self, type_name: &str) -> Result<&TypeDescriptor, ConfigurationError> {
        self.entry(type_name).map(|entry| &entry.descriptor)
    }

    /// Iterates registered type descriptors sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values().map(|entry| &entry.descriptor)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn entry(&self, type_name: &str) -> Result<&TypeEntry, ConfigurationError> {
        self.types
            .get(type_name)
            .ok_or_else(|| ConfigurationError::UnknownType(type_name.to_string()))
    }
}

/// Type names double as SQL table suffixes, so keep them identifier-safe.
pub(crate) fn is_valid_type_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    value.chars().count() <= MAX_TYPE_NAME_CHARS
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
