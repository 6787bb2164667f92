//! Error types for dimscope
//!
//! Every failure is reported synchronously at the operation that caused it.
//! Nothing here is retried or recovered internally, and a failed allocation
//! never leaves a binding behind.

use crate::frame::Name;
use crate::slot::{DimType, Slot};

/// Result type for allocator operations
pub type DimResult<T> = Result<T, DimError>;

/// Main error type for allocator operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimError {
    /// A name or slot is already bound incompatibly
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictKind),

    /// Invalid `first_available_dim`, `history` or ceiling value
    #[error("configuration error: {0}")]
    Config(String),

    /// No free slot is left in the requested region
    #[error("ran out of {region} slots while allocating '{name}' (ceiling {ceiling})")]
    Exhausted {
        name: Name,
        region: DimType,
        ceiling: usize,
    },

    /// A name that had to be bound was not
    #[error("name '{0}' is not bound")]
    Unbound(Name),
}

/// The concrete shape of a binding conflict
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictKind {
    /// Same name, different slot
    #[error("name '{name}' is already bound to slot {existing}, requested {requested}")]
    NameBound {
        name: Name,
        existing: Slot,
        requested: Slot,
    },

    /// Same slot, different name
    #[error("slot {slot} is already bound to '{existing}', requested for '{requested}'")]
    SlotBound {
        slot: Slot,
        existing: Name,
        requested: Name,
    },

    /// A pinned slot lies outside the region of its dim type
    #[error("slot {slot} requested for '{name}' is outside the {dim_type} region")]
    WrongRegion {
        name: Name,
        slot: Slot,
        dim_type: DimType,
    },

    /// The name is already live under a different dim type
    #[error("name '{name}' is bound as {existing}, requested as {requested}")]
    RegionMismatch {
        name: Name,
        existing: DimType,
        requested: DimType,
    },

    /// Local names only go away when their scope exits
    #[error("local name '{name}' can only be released by leaving its scope")]
    LocalRelease { name: Name },
}

impl DimError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        DimError::Config(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DimError::Conflict(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, DimError::Config(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, DimError::Exhausted { .. })
    }
}

impl From<crate::config::ConfigParseError> for DimError {
    fn from(err: crate::config::ConfigParseError) -> Self {
        DimError::Config(err.to_string())
    }
}
