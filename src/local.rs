// src/local.rs - In-process task substrate backed by host memory
//
// Launches queue up lock-free until `flush`, which treats everything queued as
// one batch: slots are planned for the whole batch first, then task bodies run
// against their slot buffers and write back to the host regions. Tasks sharing
// a slot run in launch order; distinct slots run in parallel.
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::queue::SegQueue;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::CacheConfig;
use crate::initializer::{glorot_fill, zeros_fill};
use crate::manager::{AssignedSet, CacheStats, ResourceManager};
use crate::region::{RegionId, Tensor};
use crate::runtime::{
    Context, Model, Runtime, TaskArgument, TaskLauncher, GLOROT_INIT_TASK_ID, ZEROS_INIT_TASK_ID,
};
use crate::CacheError;

/// Configuration for the local substrate
#[derive(Debug, Clone, Default)]
pub struct LocalRuntimeConfig {
    pub cache: CacheConfig,
    /// Seed for fill tasks; `None` draws from the OS
    pub seed: Option<u64>,
}

/// Outcome of one flushed batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub tasks_run: usize,
    /// Slot chosen for each region requirement, in launch order
    pub placements: Vec<(RegionId, usize)>,
}

#[derive(Debug, Clone, Copy)]
enum FillKind {
    Glorot(f32),
    Zeros,
}

struct PlannedTask {
    fill: FillKind,
    region: RegionId,
    slot: usize,
    volume: usize,
}

pub struct LocalRuntime {
    manager: Mutex<ResourceManager>,
    fb_memory: Vec<Mutex<Vec<f32>>>,
    regions: Mutex<HashMap<RegionId, Vec<f32>>>,
    pending: SegQueue<(Context, TaskLauncher)>,
    next_region: AtomicU64,
    tasks_run: AtomicU64,
    seed: Option<u64>,
}

impl LocalRuntime {
    pub fn new(config: LocalRuntimeConfig) -> Result<Self, CacheError> {
        let manager = ResourceManager::new(&config.cache)?;
        let fb_memory = config
            .cache
            .slot_capacities
            .iter()
            .map(|&capacity| Mutex::new(vec![0.0; capacity]))
            .collect();

        log::info!(
            "Local runtime with {} fb slots, capacities {:?}",
            manager.num_slots(),
            config.cache.slot_capacities
        );

        Ok(Self {
            manager: Mutex::new(manager),
            fb_memory,
            regions: Mutex::new(HashMap::new()),
            pending: SegQueue::new(),
            next_region: AtomicU64::new(1),
            tasks_run: AtomicU64::new(0),
            seed: config.seed,
        })
    }

    /// Model handle launching onto this runtime
    pub fn model(self: &Arc<Self>, ctx: Context) -> Model {
        Model::new(ctx, Arc::clone(self) as Arc<dyn Runtime>)
    }

    /// Create a region for a tensor of the given shape. Contents are NaN
    /// until a fill task writes them.
    pub fn create_tensor(&self, dims: &[usize]) -> Tensor {
        let region = RegionId(self.next_region.fetch_add(1, Ordering::Relaxed));
        let tensor = Tensor::new(region, dims);
        lock(&self.regions).insert(region, vec![f32::NAN; tensor.volume()]);
        tensor
    }

    pub fn read_region(&self, region: RegionId) -> Result<Vec<f32>, CacheError> {
        lock(&self.regions)
            .get(&region)
            .cloned()
            .ok_or(CacheError::UnknownRegion(region))
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    pub fn manager_stats(&self) -> CacheStats {
        lock(&self.manager).stats()
    }

    /// Slot currently holding `region`, if any
    pub fn resident_slot(&self, region: RegionId) -> Option<usize> {
        lock(&self.manager).resident_slot(region)
    }

    /// Run everything queued as one batch.
    ///
    /// Placement is planned on a copy of the slot table and committed only if
    /// every requirement of every launch fits; otherwise the batch is dropped
    /// and the table is left as it was.
    pub fn flush(&self) -> Result<BatchReport, CacheError> {
        let mut launches = Vec::new();
        while let Some(launch) = self.pending.pop() {
            launches.push(launch);
        }
        if launches.is_empty() {
            return Ok(BatchReport::default());
        }

        let (tasks, placements) = match self.plan(&launches) {
            Ok(planned) => planned,
            Err(e) => {
                log::warn!("Dropping batch of {} tasks: {}", launches.len(), e);
                return Err(e);
            }
        };

        let first_seq = self
            .tasks_run
            .fetch_add(tasks.len() as u64, Ordering::Relaxed);

        let mut by_slot: BTreeMap<usize, Vec<(u64, &PlannedTask)>> = BTreeMap::new();
        for (i, task) in tasks.iter().enumerate() {
            by_slot
                .entry(task.slot)
                .or_default()
                .push((first_seq + i as u64, task));
        }

        crossbeam::scope(|s| {
            let handles: Vec<_> = by_slot
                .into_values()
                .map(|group| s.spawn(move |_| self.run_group(&group)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(CacheError::InvalidLaunch("task body panicked".to_string()))
                    })
                })
                .collect::<Result<Vec<()>, CacheError>>()
        })
        .map_err(|_| CacheError::InvalidLaunch("task body panicked".to_string()))??;

        log::info!(
            "Batch done: {} tasks, placements {:?}",
            tasks.len(),
            placements
        );
        Ok(BatchReport {
            tasks_run: tasks.len(),
            placements,
        })
    }

    #[allow(clippy::type_complexity)]
    fn plan(
        &self,
        launches: &[(Context, TaskLauncher)],
    ) -> Result<(Vec<PlannedTask>, Vec<(RegionId, usize)>), CacheError> {
        let regions = lock(&self.regions);
        let mut manager = lock(&self.manager);
        let mut scratch = manager.clone();
        let mut assigned = AssignedSet::new();
        let mut tasks = Vec::with_capacity(launches.len());
        let mut placements = Vec::new();

        for (ctx, launcher) in launches {
            let fill = fill_kind(launcher)?;
            log::trace!("Planning task {:?} from {:?}", launcher.task_id, ctx);
            for (idx, req) in launcher.requirements.iter().enumerate() {
                let volume = regions
                    .get(&req.region)
                    .map(Vec::len)
                    .ok_or(CacheError::UnknownRegion(req.region))?;
                let slot = scratch.assign(req.region, volume, &mut assigned)?;
                placements.push((req.region, slot));
                // the fill bodies only write regions[0]
                if idx == 0 {
                    tasks.push(PlannedTask {
                        fill,
                        region: req.region,
                        slot,
                        volume,
                    });
                }
            }
        }

        *manager = scratch;
        Ok((tasks, placements))
    }

    fn task_rng(&self, seq: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(seq)),
            None => StdRng::from_os_rng(),
        }
    }

    fn run_group(&self, group: &[(u64, &PlannedTask)]) -> Result<(), CacheError> {
        for &(seq, task) in group {
            self.run_task(task, self.task_rng(seq))?;
        }
        Ok(())
    }

    fn run_task(&self, task: &PlannedTask, mut rng: StdRng) -> Result<(), CacheError> {
        let mut slot = lock(&self.fb_memory[task.slot]);
        let data = &mut slot[..task.volume];
        match task.fill {
            FillKind::Glorot(scale) => glorot_fill(data, scale, &mut rng)?,
            FillKind::Zeros => zeros_fill(data),
        }

        // write-back of the write-only region
        if let Some(host) = lock(&self.regions).get_mut(&task.region) {
            host.copy_from_slice(data);
        }
        log::trace!("[{}] filled {} ({} elements)", task.slot, task.region, task.volume);
        Ok(())
    }
}

impl Runtime for LocalRuntime {
    fn execute_task(&self, ctx: Context, launcher: TaskLauncher) {
        log::trace!("Queued task {:?} from {:?}", launcher.task_id, ctx);
        self.pending.push((ctx, launcher));
    }
}

fn fill_kind(launcher: &TaskLauncher) -> Result<FillKind, CacheError> {
    if launcher.requirements.is_empty() {
        return Err(CacheError::InvalidLaunch(format!(
            "task {:?} has no region requirement",
            launcher.task_id
        )));
    }
    match (launcher.task_id, launcher.arg) {
        (GLOROT_INIT_TASK_ID, TaskArgument::Scale(scale)) if scale.is_finite() && scale >= 0.0 => {
            Ok(FillKind::Glorot(scale))
        }
        (GLOROT_INIT_TASK_ID, TaskArgument::Scale(scale)) => Err(CacheError::InvalidLaunch(
            format!("glorot init launched with scale {}", scale),
        )),
        (GLOROT_INIT_TASK_ID, TaskArgument::None) => Err(CacheError::InvalidLaunch(
            "glorot init launched without a scale".to_string(),
        )),
        (ZEROS_INIT_TASK_ID, _) => Ok(FillKind::Zeros),
        (other, _) => Err(CacheError::InvalidLaunch(format!(
            "no task registered for {:?}",
            other
        ))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
