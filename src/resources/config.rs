//! Configuration for the reference memory resource.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for [`SystemMemoryResource`](super::SystemMemoryResource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Byte budget across all spaces. `None` means unlimited.
    pub memory_budget: Option<usize>,

    /// Fraction of the budget above which allocations log a warning.
    /// Default: 0.9
    pub low_memory_threshold: f32,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            memory_budget: None,
            low_memory_threshold: 0.9,
        }
    }
}

impl ResourcesConfig {
    /// Config with a byte budget.
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            memory_budget: Some(bytes),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_budget == Some(0) {
            return Err(Error::InvalidParameter {
                name: "memory_budget",
                reason: "must be > 0 when set".to_string(),
            });
        }
        if !(self.low_memory_threshold > 0.0 && self.low_memory_threshold <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "low_memory_threshold",
                reason: format!("must be in (0, 1], got {}", self.low_memory_threshold),
            });
        }
        Ok(())
    }
}
