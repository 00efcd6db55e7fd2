// src/region.rs - Logical region handles and tensor descriptors

/// Handle to a logical region (a tensor's backing storage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Field identifier within a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

pub const FID_DATA: FieldId = FieldId(0);

/// Tensor descriptor: which region backs it and its shape
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub region: RegionId,
    pub field: FieldId,
    dims: Vec<usize>,
}

impl Tensor {
    pub fn new(region: RegionId, dims: &[usize]) -> Self {
        Self {
            region,
            field: FID_DATA,
            dims: dims.to_vec(),
        }
    }

    pub fn num_dim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of elements in the backing region
    pub fn volume(&self) -> usize {
        self.dims.iter().product()
    }
}
