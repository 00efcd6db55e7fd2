// src/config.rs - Slot table configuration
use crate::{CacheError, DEFAULT_SLOT_CAPACITY, MAX_NUM_CACHES};

/// Configuration for the frame-buffer slot table
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Capacity in elements of each slot, in table order
    pub slot_capacities: Vec<usize>,
}

impl CacheConfig {
    pub fn with_capacities(capacities: &[usize]) -> Self {
        Self {
            slot_capacities: capacities.to_vec(),
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.slot_capacities.is_empty() {
            return Err(CacheError::InvalidConfig(
                "slot table must have at least one slot".to_string(),
            ));
        }
        if self.slot_capacities.len() > MAX_NUM_CACHES {
            return Err(CacheError::InvalidConfig(format!(
                "{} slots requested, at most {} supported",
                self.slot_capacities.len(),
                MAX_NUM_CACHES
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            slot_capacities: vec![DEFAULT_SLOT_CAPACITY; MAX_NUM_CACHES],
        }
    }
}
