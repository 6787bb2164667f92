//! Configuration module for dimscope
//!
//! The allocator has a deliberately small surface: the visible boundary
//! `first_available_dim`, the slot ceiling, the default history for new
//! scopes and an optional cap on GLOBAL names. Values can come from code or
//! from a configuration file of `param value` lines.

mod parser;

pub use parser::{parse_config_file, parse_config_str, ConfigParseError};

use std::path::PathBuf;

use crate::error::{DimError, DimResult};
use crate::slot::{SlotRange, DEFAULT_FIRST_AVAILABLE_DIM, DEFAULT_MAX_DIMS};

/// Default number of enclosing frames visible from a new scope
pub const DEFAULT_HISTORY: usize = 1;

/// Allocator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Number of rightmost slots reserved for VISIBLE dims
    pub first_available_dim: usize,

    /// Ceiling on slot magnitude; nothing is allocated beyond it
    pub max_dims: usize,

    /// History used when a scope is entered without one
    pub default_history: usize,

    /// Cap on concurrently bound GLOBAL names (None = only the ceiling)
    pub max_global_dims: Option<usize>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            first_available_dim: DEFAULT_FIRST_AVAILABLE_DIM,
            max_dims: DEFAULT_MAX_DIMS,
            default_history: DEFAULT_HISTORY,
            max_global_dims: None,
        }
    }
}

impl AllocatorConfig {
    /// Load configuration from a file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigParseError> {
        let path = path.into();
        parse_config_file(&path)
    }

    /// Check every value and build the slot partition they describe
    pub fn slot_range(&self) -> DimResult<SlotRange> {
        SlotRange::new(self.first_available_dim, self.max_dims)?
            .with_global_limit(self.max_global_dims)
    }

    /// Validate the configuration
    pub fn validate(&self) -> DimResult<()> {
        self.slot_range()?;
        self.check_history(self.default_history)?;
        Ok(())
    }

    /// A history is valid if it does not exceed the nesting ceiling
    pub fn check_history(&self, history: usize) -> DimResult<usize> {
        if history > self.max_dims {
            return Err(DimError::config(format!(
                "history {} exceeds the nesting ceiling of {}",
                history, self.max_dims
            )));
        }
        Ok(history)
    }

    /// Get a configuration parameter by name
    pub fn get(&self, param: &str) -> Option<String> {
        match param {
            "first-available-dim" => Some(self.first_available_dim.to_string()),
            "max-dims" => Some(self.max_dims.to_string()),
            "default-history" => Some(self.default_history.to_string()),
            "max-global-dims" => Some(self.max_global_dims_str()),
            _ => None,
        }
    }

    /// Get all configuration parameters
    pub fn get_all(&self) -> Vec<(String, String)> {
        vec![
            (
                "first-available-dim".to_string(),
                self.first_available_dim.to_string(),
            ),
            ("max-dims".to_string(), self.max_dims.to_string()),
            ("default-history".to_string(), self.default_history.to_string()),
            ("max-global-dims".to_string(), self.max_global_dims_str()),
        ]
    }

    fn max_global_dims_str(&self) -> String {
        match self.max_global_dims {
            Some(limit) => limit.to_string(),
            None => "none".to_string(),
        }
    }
}
