//! Fixed-slot frame-buffer cache assignment.
//!
//! A [`ResourceManager`] owns a small table of device cache slots and decides,
//! per batch of concurrent operations, which slot each logical region lives in.
//! The [`initializer`] strategies and the in-process [`LocalRuntime`] are its
//! clients: launches are planned against the slot table before any task runs.

pub mod config;
pub mod ffi;
pub mod initializer;
pub mod local;
pub mod manager;
pub mod region;
pub mod runtime;

pub use config::CacheConfig;
pub use initializer::{GlorotUniform, Initializer, ZerosInitializer};
pub use local::{BatchReport, LocalRuntime, LocalRuntimeConfig};
pub use manager::{AssignedSet, CacheSlot, CacheStats, ResourceManager};
pub use region::{FieldId, RegionId, Tensor, FID_DATA};
pub use runtime::{Context, Model, Runtime, TaskLauncher};

// Configuration constants
pub const MAX_NUM_CACHES: usize = 4;
pub const DEFAULT_SLOT_CAPACITY: usize = 1 << 20; // elements, not bytes

/// Errors raised by slot assignment, initialization and the local substrate
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    /// No unclaimed slot in the batch can hold the request
    NoFreeSlot { num_element: usize },
    /// A resident region asked for more room than its slot reserves
    CapacityExceeded {
        slot: usize,
        num_element: usize,
        capacity: usize,
    },
    RankMismatch { expected: usize, found: usize },
    /// Extents that admit no fill scale (zero or overflowing fan)
    InvalidShape(Vec<usize>),
    InvalidConfig(String),
    InvalidLaunch(String),
    UnknownRegion(RegionId),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::NoFreeSlot { num_element } => {
                write!(f, "No free cache slot can hold {} elements", num_element)
            }
            CacheError::CapacityExceeded {
                slot,
                num_element,
                capacity,
            } => write!(
                f,
                "Resident region needs {} elements but slot {} holds {}",
                num_element, slot, capacity
            ),
            CacheError::RankMismatch { expected, found } => {
                write!(f, "Expected a rank-{} tensor, got rank {}", expected, found)
            }
            CacheError::InvalidShape(dims) => write!(f, "Invalid tensor extents {:?}", dims),
            CacheError::InvalidConfig(msg) => write!(f, "Invalid cache config: {}", msg),
            CacheError::InvalidLaunch(msg) => write!(f, "Invalid task launch: {}", msg),
            CacheError::UnknownRegion(region) => write!(f, "Unknown region {}", region),
        }
    }
}

impl std::error::Error for CacheError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_condition() {
        let err = CacheError::CapacityExceeded {
            slot: 2,
            num_element: 64,
            capacity: 50,
        };
        assert_eq!(
            err.to_string(),
            "Resident region needs 64 elements but slot 2 holds 50"
        );
        assert!(CacheError::NoFreeSlot { num_element: 7 }
            .to_string()
            .contains("7 elements"));
    }
}
