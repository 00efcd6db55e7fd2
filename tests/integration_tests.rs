// tests/integration_tests.rs - Slot assignment and initialization end to end
use fb_slot_cache::*;
use std::sync::Arc;

fn local_runtime(capacities: &[usize], seed: u64) -> Result<Arc<LocalRuntime>, CacheError> {
    let config = LocalRuntimeConfig {
        cache: CacheConfig::with_capacities(capacities),
        seed: Some(seed),
    };
    Ok(Arc::new(LocalRuntime::new(config)?))
}

#[test]
fn test_scenario_best_fit_and_residency() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::try_init().ok();

    let mut manager = ResourceManager::new(&CacheConfig::with_capacities(&[10, 100, 50]))?;
    let mut assigned = AssignedSet::new();
    let (r1, r2) = (RegionId(1), RegionId(2));

    let s1 = manager.assign(r1, 40, &mut assigned)?;
    assert_eq!(manager.slot(s1).map(CacheSlot::capacity), Some(50));

    let s2 = manager.assign(r2, 5, &mut assigned)?;
    assert_eq!(manager.slot(s2).map(CacheSlot::capacity), Some(10));

    assert_eq!(manager.assign(r2, 5, &mut assigned)?, s2);
    assigned.clear();
    assert_eq!(manager.assign(r2, 5, &mut assigned)?, s2);
    assert_eq!(manager.assign(r1, 12, &mut assigned)?, s1);
    Ok(())
}

#[test]
fn test_scenario_assigned_set_filter() -> Result<(), Box<dyn std::error::Error>> {
    let mut manager = ResourceManager::new(&CacheConfig::with_capacities(&[10, 100, 50]))?;
    let mut assigned = AssignedSet::new();
    assigned.insert(0);
    assigned.insert(2);

    let slot = manager.assign(RegionId(3), 80, &mut assigned)?;
    assert_eq!(manager.slot(slot).map(CacheSlot::capacity), Some(100));

    // every slot is now claimed
    assert_eq!(
        manager.assign(RegionId(4), 1, &mut assigned),
        Err(CacheError::NoFreeSlot { num_element: 1 })
    );
    Ok(())
}

#[test]
fn test_scenario_glorot_bounds() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::try_init().ok();

    let rt = local_runtime(&[64 * 128, 1 << 14], 3)?;
    let model = rt.model(Context(0));
    let weights = rt.create_tensor(&[64, 128]);
    let scale = GlorotUniform::scale(&weights)?;
    assert_eq!(scale, (6.0f64 / 192.0).sqrt() as f32);

    let (mut lo, mut hi) = (f32::MAX, f32::MIN);
    for _ in 0..4 {
        GlorotUniform::new().init(&model, &weights)?;
        rt.flush()?;
        let data = rt.read_region(weights.region)?;
        assert_eq!(data.len(), 64 * 128);
        for &v in &data {
            assert!(v >= -scale && v <= scale, "{} outside [-{}, {}]", v, scale, scale);
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    assert!(lo < -0.99 * scale);
    assert!(hi > 0.99 * scale);

    // refills keep the same slot
    let stats = rt.manager_stats();
    assert_eq!(stats.fresh_assignments, 1);
    assert_eq!(stats.residency_hits, 3);
    Ok(())
}

#[test]
fn test_scenario_zero_fill() -> Result<(), Box<dyn std::error::Error>> {
    let rt = local_runtime(&[16, 512, 4096], 5)?;
    let model = rt.model(Context(0));
    let shapes: [&[usize]; 3] = [&[1, 1], &[3, 5], &[32, 100]];

    let tensors: Vec<Tensor> = shapes.iter().map(|dims| rt.create_tensor(dims)).collect();
    for t in &tensors {
        ZerosInitializer::new().init(&model, t)?;
    }
    let report = rt.flush()?;
    assert_eq!(report.tasks_run, 3);

    for t in &tensors {
        assert!(rt.read_region(t.region)?.iter().all(|&v| v == 0.0));
    }
    Ok(())
}

#[test]
fn test_scenario_rank_3_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let rt = local_runtime(&[1024], 1)?;
    let model = rt.model(Context(0));
    let cube = rt.create_tensor(&[4, 4, 4]);

    let initializers: [&dyn Initializer; 2] = [&GlorotUniform, &ZerosInitializer];
    for init in initializers {
        assert_eq!(
            init.init(&model, &cube),
            Err(CacheError::RankMismatch {
                expected: 2,
                found: 3
            })
        );
    }
    assert_eq!(rt.pending_tasks(), 0);
    assert!(rt.read_region(cube.region)?.iter().all(|v| v.is_nan()));
    Ok(())
}

#[test]
fn test_batches_reuse_slots_across_regions() -> Result<(), Box<dyn std::error::Error>> {
    let rt = local_runtime(&[100, 100], 9)?;
    let model = rt.model(Context(0));
    let a = rt.create_tensor(&[10, 10]);
    let b = rt.create_tensor(&[10, 10]);
    let c = rt.create_tensor(&[10, 10]);

    ZerosInitializer::new().init(&model, &a)?;
    ZerosInitializer::new().init(&model, &b)?;
    let first = rt.flush()?;
    assert_eq!(first.placements, vec![(a.region, 0), (b.region, 1)]);

    // c displaces a; b stays put
    ZerosInitializer::new().init(&model, &b)?;
    ZerosInitializer::new().init(&model, &c)?;
    let second = rt.flush()?;
    assert_eq!(second.placements, vec![(b.region, 1), (c.region, 0)]);
    assert_eq!(rt.resident_slot(a.region), None);
    assert!(rt.read_region(a.region)?.iter().all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn test_same_region_twice_in_one_batch() -> Result<(), Box<dyn std::error::Error>> {
    let rt = local_runtime(&[100], 2)?;
    let model = rt.model(Context(0));
    let t = rt.create_tensor(&[10, 10]);

    GlorotUniform::new().init(&model, &t)?;
    ZerosInitializer::new().init(&model, &t)?;
    let report = rt.flush()?;

    assert_eq!(report.placements, vec![(t.region, 0), (t.region, 0)]);
    // the later zero fill wins
    assert!(rt.read_region(t.region)?.iter().all(|&v| v == 0.0));

    ZerosInitializer::new().init(&model, &t)?;
    GlorotUniform::new().init(&model, &t)?;
    rt.flush()?;

    let data = rt.read_region(t.region)?;
    let scale = GlorotUniform::scale(&t)?;
    assert!(data.iter().all(|v| (-scale..=scale).contains(v)));
    assert!(data.iter().any(|&v| v != 0.0));
    Ok(())
}

#[test]
fn test_launch_order_holds_across_repeated_batches() -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..100 {
        let rt = local_runtime(&[1 << 16], 17)?;
        let model = rt.model(Context(0));
        let t = rt.create_tensor(&[256, 256]);

        GlorotUniform::new().init(&model, &t)?;
        ZerosInitializer::new().init(&model, &t)?;
        rt.flush()?;
        assert!(rt.read_region(t.region)?.iter().all(|&v| v == 0.0));
    }
    Ok(())
}
