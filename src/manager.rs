// src/manager.rs - Frame-buffer slot table and best-fit assignment
use std::collections::BTreeSet;

use crate::config::CacheConfig;
use crate::region::RegionId;
use crate::CacheError;

/// One physical frame-buffer cache slot
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSlot {
    capacity: usize,
    resident: Option<RegionId>,
}

impl CacheSlot {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            resident: None,
        }
    }

    /// Maximum element count this slot can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Region currently mapped to this slot, if any
    pub fn resident(&self) -> Option<RegionId> {
        self.resident
    }
}

/// Slot indices already claimed within one batch.
///
/// Owned by the caller and threaded through every [`ResourceManager::assign`]
/// call of a batch; clear it (or start a new one) between batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignedSet {
    slots: BTreeSet<usize>,
}

impl AssignedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: usize) -> bool {
        self.slots.insert(slot)
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.slots.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Claimed slot indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().copied()
    }
}

/// Statistics for slot table monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub num_slots: usize,
    pub resident_slots: usize,
    pub total_capacity: usize,
    pub residency_hits: usize,
    pub fresh_assignments: usize,
}

/// Owns the slot table and answers "which slot should this region use?"
///
/// Not internally synchronized: calls belonging to one batch must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    fb_cache: Vec<CacheSlot>,
    residency_hits: usize,
    fresh_assignments: usize,
}

impl ResourceManager {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            fb_cache: config
                .slot_capacities
                .iter()
                .map(|&capacity| CacheSlot::new(capacity))
                .collect(),
            residency_hits: 0,
            fresh_assignments: 0,
        })
    }

    /// Pick the slot `region` uses for this batch.
    ///
    /// A region already resident keeps its slot. Otherwise the smallest slot
    /// not yet claimed in `assigned` that fits `num_element` is taken (lowest
    /// index on ties) and its previous resident is overwritten. On error
    /// neither the table nor `assigned` is touched.
    pub fn assign(
        &mut self,
        region: RegionId,
        num_element: usize,
        assigned: &mut AssignedSet,
    ) -> Result<usize, CacheError> {
        if let Some(slot) = self.resident_slot(region) {
            let capacity = self.fb_cache[slot].capacity;
            log::debug!(
                "[{}] {} resident: num_element({}) capacity({})",
                slot,
                region,
                num_element,
                capacity
            );
            if num_element > capacity {
                log::warn!(
                    "{} needs {} elements, slot {} only reserves {}",
                    region,
                    num_element,
                    slot,
                    capacity
                );
                return Err(CacheError::CapacityExceeded {
                    slot,
                    num_element,
                    capacity,
                });
            }
            assigned.insert(slot);
            self.residency_hits += 1;
            return Ok(slot);
        }

        let mut best: Option<usize> = None;
        for (idx, slot) in self.fb_cache.iter().enumerate() {
            if assigned.contains(idx) || slot.capacity < num_element {
                continue;
            }
            if best.map_or(true, |b| slot.capacity < self.fb_cache[b].capacity) {
                best = Some(idx);
            }
        }

        let Some(slot) = best else {
            log::warn!(
                "No free slot for {} ({} elements, {} of {} slots claimed)",
                region,
                num_element,
                assigned.len(),
                self.fb_cache.len()
            );
            return Err(CacheError::NoFreeSlot { num_element });
        };

        if let Some(previous) = self.fb_cache[slot].resident {
            log::debug!("[{}] overwriting {} with {}", slot, previous, region);
        }
        self.fb_cache[slot].resident = Some(region);
        assigned.insert(slot);
        self.fresh_assignments += 1;
        log::debug!(
            "[{}] assigned {} ({} elements, capacity {})",
            slot,
            region,
            num_element,
            self.fb_cache[slot].capacity
        );
        Ok(slot)
    }

    /// Slot currently holding `region`, without claiming it
    pub fn resident_slot(&self, region: RegionId) -> Option<usize> {
        self.fb_cache
            .iter()
            .position(|slot| slot.resident == Some(region))
    }

    /// Forget every residency; capacities are kept
    pub fn reset(&mut self) {
        for slot in &mut self.fb_cache {
            slot.resident = None;
        }
    }

    pub fn num_slots(&self) -> usize {
        self.fb_cache.len()
    }

    pub fn slot(&self, idx: usize) -> Option<&CacheSlot> {
        self.fb_cache.get(idx)
    }

    pub fn slots(&self) -> &[CacheSlot] {
        &self.fb_cache
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            num_slots: self.fb_cache.len(),
            resident_slots: self
                .fb_cache
                .iter()
                .filter(|slot| slot.resident.is_some())
                .count(),
            total_capacity: self.fb_cache.iter().map(|slot| slot.capacity).sum(),
            residency_hits: self.residency_hits,
            fresh_assignments: self.fresh_assignments,
        }
    }
}
