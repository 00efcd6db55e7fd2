// src/initializer.rs - Parameter initialization strategies
use rand::Rng;

use crate::region::{Tensor, FID_DATA};
use crate::runtime::{
    Coherence, MappingTag, Model, Privilege, RegionRequirement, TaskArgument, TaskId,
    TaskLauncher, GLOROT_INIT_TASK_ID, ZEROS_INIT_TASK_ID,
};
use crate::CacheError;

/// Fills a tensor's backing region by launching one task on the model runtime
pub trait Initializer {
    fn init(&self, model: &Model, p: &Tensor) -> Result<(), CacheError>;
}

/// Uniform fill in `[-scale, scale]` with `scale = sqrt(6 / (d0 + d1))`
#[derive(Debug, Clone, Copy, Default)]
pub struct GlorotUniform;

impl GlorotUniform {
    pub fn new() -> Self {
        Self
    }

    pub fn scale(p: &Tensor) -> Result<f32, CacheError> {
        require_rank_2(p)?;
        let dims = p.dims();
        let fan = dims[0]
            .checked_add(dims[1])
            .filter(|&fan| fan > 0)
            .ok_or_else(|| CacheError::InvalidShape(dims.to_vec()))?;
        Ok((6.0 / fan as f64).sqrt() as f32)
    }
}

impl Initializer for GlorotUniform {
    fn init(&self, model: &Model, p: &Tensor) -> Result<(), CacheError> {
        let scale = Self::scale(p)?;
        log::debug!("Glorot init of {} {:?}: scale={}", p.region, p.dims(), scale);
        let launcher = fill_launcher(GLOROT_INIT_TASK_ID, TaskArgument::Scale(scale), p)?;
        model.runtime.execute_task(model.ctx, launcher);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZerosInitializer;

impl ZerosInitializer {
    pub fn new() -> Self {
        Self
    }
}

impl Initializer for ZerosInitializer {
    fn init(&self, model: &Model, p: &Tensor) -> Result<(), CacheError> {
        require_rank_2(p)?;
        log::debug!("Zeros init of {} {:?}", p.region, p.dims());
        let launcher = fill_launcher(ZEROS_INIT_TASK_ID, TaskArgument::None, p)?;
        model.runtime.execute_task(model.ctx, launcher);
        Ok(())
    }
}

fn require_rank_2(p: &Tensor) -> Result<(), CacheError> {
    if p.num_dim() != 2 {
        return Err(CacheError::RankMismatch {
            expected: 2,
            found: p.num_dim(),
        });
    }
    Ok(())
}

// regions[0]: p.region, write-only so prior contents are never read
fn fill_launcher(
    task_id: TaskId,
    arg: TaskArgument,
    p: &Tensor,
) -> Result<TaskLauncher, CacheError> {
    let mut launcher = TaskLauncher::new(task_id, arg);
    let idx = launcher.add_region_requirement(RegionRequirement::new(
        p.region,
        Privilege::WriteOnly,
        Coherence::Exclusive,
        p.region,
        MappingTag::MapToFbMemory,
    ));
    launcher.add_field(idx, FID_DATA)?;
    Ok(launcher)
}

/// Task body for `GLOROT_INIT_TASK_ID`; `scale` must be finite and non-negative
pub fn glorot_fill<R: Rng + ?Sized>(
    data: &mut [f32],
    scale: f32,
    rng: &mut R,
) -> Result<(), CacheError> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(CacheError::InvalidLaunch(format!(
            "glorot scale {} is not a finite bound",
            scale
        )));
    }
    for value in data.iter_mut() {
        *value = rng.random_range(-scale..=scale);
    }
    Ok(())
}

/// Task body for `ZEROS_INIT_TASK_ID`
pub fn zeros_fill(data: &mut [f32]) {
    data.fill(0.0);
}
