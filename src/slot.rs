//! Slots and the slot range policy
//!
//! A slot is a position in a positional axis list counted from the right,
//! so `-1` is the last axis. The slots are split into three regions:
//!
//! ```text
//!   -C ......... -(k+1) | -k ...... -1
//!   LOCAL and GLOBAL    |  VISIBLE
//! ```
//!
//! where `k` is `first_available_dim` and `C` is the `max_dims` ceiling.
//! GLOBAL and LOCAL names draw from the same slots; every binding remembers
//! which of the two it is, and a slot is never bound twice.

use std::fmt;

use crate::error::{DimError, DimResult};

/// Default number of rightmost slots reserved for visible dims
pub const DEFAULT_FIRST_AVAILABLE_DIM: usize = 4;

/// Default ceiling on the slot magnitude
pub const DEFAULT_MAX_DIMS: usize = 25;

/// Largest magnitude a `Slot` can represent
pub const MAX_SLOT_MAGNITUDE: usize = i32::MAX as usize;

/// A positional slot, always negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(i32);

impl Slot {
    /// Create a slot from a raw position. Only negative positions are slots.
    pub fn new(position: i32) -> Option<Self> {
        if position < 0 {
            Some(Slot(position))
        } else {
            None
        }
    }

    /// The slot `magnitude` positions from the right (`1` is `-1`).
    pub fn from_magnitude(magnitude: usize) -> Self {
        debug_assert!(magnitude > 0, "slot magnitude must be positive");
        let magnitude = magnitude.clamp(1, i32::MAX as usize) as i32;
        Slot(-magnitude)
    }

    /// The raw negative position
    pub fn get(self) -> i32 {
        self.0
    }

    /// Distance from the right end of the axis list
    pub fn magnitude(self) -> usize {
        self.0.unsigned_abs() as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Slot> for i32 {
    fn from(slot: Slot) -> i32 {
        slot.0
    }
}

/// Which region (and which frame) an allocation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DimType {
    /// Recycled when the owning scope exits
    #[default]
    Local,

    /// Persists across scopes until released
    Global,

    /// Pinned to the rightmost, user-facing positions
    Visible,
}

impl DimType {
    /// Whether bindings of this type live in the persistent frame
    pub fn is_persistent(self) -> bool {
        !matches!(self, DimType::Local)
    }
}

impl fmt::Display for DimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimType::Local => write!(f, "LOCAL"),
            DimType::Global => write!(f, "GLOBAL"),
            DimType::Visible => write!(f, "VISIBLE"),
        }
    }
}

/// Static partition of the slot space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    /// Number of rightmost slots reserved for VISIBLE dims
    first_available_dim: usize,

    /// Largest slot magnitude that may ever be handed out
    max_dims: usize,

    /// Optional cap on concurrently bound GLOBAL names
    max_global_dims: Option<usize>,
}

impl Default for SlotRange {
    fn default() -> Self {
        SlotRange {
            first_available_dim: DEFAULT_FIRST_AVAILABLE_DIM,
            max_dims: DEFAULT_MAX_DIMS,
            max_global_dims: None,
        }
    }
}

impl SlotRange {
    /// Create a validated slot range
    pub fn new(first_available_dim: usize, max_dims: usize) -> DimResult<Self> {
        Self::check(first_available_dim, max_dims)?;
        Ok(SlotRange {
            first_available_dim,
            max_dims,
            max_global_dims: None,
        })
    }

    /// Cap the number of GLOBAL names that may be bound at once
    pub fn with_global_limit(mut self, max_global_dims: Option<usize>) -> DimResult<Self> {
        if let Some(limit) = max_global_dims {
            let shared = self.max_dims - self.first_available_dim;
            if limit > shared {
                return Err(DimError::config(format!(
                    "max_global_dims {} exceeds the {} slots left of the visible boundary",
                    limit, shared
                )));
            }
        }
        self.max_global_dims = max_global_dims;
        Ok(self)
    }

    fn check(first_available_dim: usize, max_dims: usize) -> DimResult<()> {
        if max_dims == 0 {
            return Err(DimError::config("max_dims must be at least 1"));
        }
        if max_dims > MAX_SLOT_MAGNITUDE {
            return Err(DimError::config(format!(
                "max_dims {} exceeds the largest slot magnitude {}",
                max_dims, MAX_SLOT_MAGNITUDE
            )));
        }
        if first_available_dim >= max_dims {
            return Err(DimError::config(format!(
                "first_available_dim {} leaves no local slot below the ceiling of {}",
                first_available_dim, max_dims
            )));
        }
        Ok(())
    }

    pub fn first_available_dim(&self) -> usize {
        self.first_available_dim
    }

    pub fn max_dims(&self) -> usize {
        self.max_dims
    }

    pub fn max_global_dims(&self) -> Option<usize> {
        self.max_global_dims
    }

    /// Move the visible boundary, returning the previous value.
    ///
    /// Callers save the returned value and restore it themselves.
    pub fn set_first_available_dim(&mut self, first_available_dim: usize) -> DimResult<usize> {
        Self::check(first_available_dim, self.max_dims)?;
        if let Some(limit) = self.max_global_dims {
            if limit > self.max_dims - first_available_dim {
                return Err(DimError::config(format!(
                    "first_available_dim {} leaves fewer than max_global_dims ({}) slots",
                    first_available_dim, limit
                )));
            }
        }
        Ok(std::mem::replace(&mut self.first_available_dim, first_available_dim))
    }

    /// Whether `slot` lies in the VISIBLE region
    pub fn is_visible(&self, slot: Slot) -> bool {
        slot.magnitude() <= self.first_available_dim
    }

    /// Whether `slot` may be bound with `dim_type`
    pub fn admits(&self, dim_type: DimType, slot: Slot) -> bool {
        let magnitude = slot.magnitude();
        match dim_type {
            DimType::Visible => magnitude <= self.first_available_dim,
            DimType::Local | DimType::Global => {
                magnitude > self.first_available_dim && magnitude <= self.max_dims
            }
        }
    }

    /// Candidate slots for a fresh allocation, rightmost first
    pub fn candidates(&self, dim_type: DimType) -> impl Iterator<Item = Slot> {
        let magnitudes = match dim_type {
            DimType::Visible => 1..=self.first_available_dim,
            DimType::Local | DimType::Global => self.first_available_dim + 1..=self.max_dims,
        };
        magnitudes.map(Slot::from_magnitude)
    }

    /// Largest magnitude a fresh allocation of `dim_type` may reach
    pub fn ceiling(&self, dim_type: DimType) -> usize {
        match dim_type {
            DimType::Visible => self.first_available_dim,
            DimType::Local | DimType::Global => self.max_dims,
        }
    }
}
