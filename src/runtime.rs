// src/runtime.rs - Task launch descriptions handed to the execution substrate
use std::sync::Arc;

use crate::region::{FieldId, RegionId};
use crate::CacheError;

/// Opaque execution context handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context(pub u64);

/// Registered task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u32);

pub const GLOROT_INIT_TASK_ID: TaskId = TaskId(1);
pub const ZEROS_INIT_TASK_ID: TaskId = TaskId(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    WriteOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coherence {
    Exclusive,
}

/// Where the substrate should map the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTag {
    MapToFbMemory,
}

/// One region a task touches and how
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRequirement {
    pub region: RegionId,
    pub privilege: Privilege,
    pub coherence: Coherence,
    pub parent: RegionId,
    pub tag: MappingTag,
    pub fields: Vec<FieldId>,
}

impl RegionRequirement {
    pub fn new(
        region: RegionId,
        privilege: Privilege,
        coherence: Coherence,
        parent: RegionId,
        tag: MappingTag,
    ) -> Self {
        Self {
            region,
            privilege,
            coherence,
            parent,
            tag,
            fields: Vec::new(),
        }
    }
}

/// Payload passed by value to the task body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskArgument {
    None,
    Scale(f32),
}

/// A single task launch: id, argument and region requirements
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLauncher {
    pub task_id: TaskId,
    pub arg: TaskArgument,
    pub requirements: Vec<RegionRequirement>,
}

impl TaskLauncher {
    pub fn new(task_id: TaskId, arg: TaskArgument) -> Self {
        Self {
            task_id,
            arg,
            requirements: Vec::new(),
        }
    }

    /// Returns the index of the added requirement
    pub fn add_region_requirement(&mut self, req: RegionRequirement) -> usize {
        self.requirements.push(req);
        self.requirements.len() - 1
    }

    pub fn add_field(&mut self, req_idx: usize, field: FieldId) -> Result<(), CacheError> {
        let task_id = self.task_id;
        let req = self.requirements.get_mut(req_idx).ok_or_else(|| {
            CacheError::InvalidLaunch(format!(
                "task {:?} has no region requirement {}",
                task_id, req_idx
            ))
        })?;
        req.fields.push(field);
        Ok(())
    }
}

/// The execution substrate. Launches are fire-and-forget from the caller's
/// side; scheduling and completion belong to the implementation.
pub trait Runtime: Send + Sync {
    fn execute_task(&self, ctx: Context, launcher: TaskLauncher);
}

/// What initializers see of the model: a context and a runtime to launch on
#[derive(Clone)]
pub struct Model {
    pub ctx: Context,
    pub runtime: Arc<dyn Runtime>,
}

impl Model {
    pub fn new(ctx: Context, runtime: Arc<dyn Runtime>) -> Self {
        Self { ctx, runtime }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("ctx", &self.ctx).finish()
    }
}
