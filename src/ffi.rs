// src/ffi.rs - C FFI bindings for the slot allocator
use crate::{AssignedSet, CacheConfig, CacheError, RegionId, ResourceManager};

// Opaque pointers for C FFI
pub struct CResourceManager(ResourceManager);
pub struct CAssignedSet(AssignedSet);

// Error codes
pub const FB_CACHE_SUCCESS: i32 = 0;
pub const FB_CACHE_ERROR_NO_FREE_SLOT: i32 = -1;
pub const FB_CACHE_ERROR_CAPACITY: i32 = -2;
pub const FB_CACHE_ERROR_INVALID_PARAM: i32 = -3;

/// Create a slot table from `len` capacities; null if the table is invalid
///
/// # Safety
/// `capacities` must point to `len` readable values.
#[no_mangle]
pub unsafe extern "C" fn fb_cache_manager_new(
    capacities: *const usize,
    len: usize,
) -> *mut CResourceManager {
    if capacities.is_null() {
        return std::ptr::null_mut();
    }
    let capacities = std::slice::from_raw_parts(capacities, len);
    match ResourceManager::new(&CacheConfig::with_capacities(capacities)) {
        Ok(manager) => Box::into_raw(Box::new(CResourceManager(manager))),
        Err(e) => {
            log::warn!("fb_cache_manager_new: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Destroy a slot table
#[no_mangle]
pub extern "C" fn fb_cache_manager_free(manager: *mut CResourceManager) {
    if !manager.is_null() {
        unsafe {
            let _ = Box::from_raw(manager);
        }
    }
}

/// Start an empty per-batch assigned set
#[no_mangle]
pub extern "C" fn fb_assigned_set_new() -> *mut CAssignedSet {
    Box::into_raw(Box::new(CAssignedSet(AssignedSet::new())))
}

#[no_mangle]
pub extern "C" fn fb_assigned_set_clear(set: *mut CAssignedSet) {
    if !set.is_null() {
        unsafe { (*set).0.clear() };
    }
}

#[no_mangle]
pub extern "C" fn fb_assigned_set_free(set: *mut CAssignedSet) {
    if !set.is_null() {
        unsafe {
            let _ = Box::from_raw(set);
        }
    }
}

/// Assign `region` to a slot for the batch tracked by `set`
#[no_mangle]
pub extern "C" fn fb_cache_assign(
    manager: *mut CResourceManager,
    region: u64,
    num_element: usize,
    set: *mut CAssignedSet,
    slot_out: *mut usize,
) -> i32 {
    if manager.is_null() || set.is_null() || slot_out.is_null() {
        return FB_CACHE_ERROR_INVALID_PARAM;
    }

    let manager = unsafe { &mut (*manager).0 };
    let set = unsafe { &mut (*set).0 };

    match manager.assign(RegionId(region), num_element, set) {
        Ok(slot) => {
            unsafe {
                *slot_out = slot;
            }
            FB_CACHE_SUCCESS
        }
        Err(e) => error_code(&e),
    }
}

/// Forget all residency
#[no_mangle]
pub extern "C" fn fb_cache_reset(manager: *mut CResourceManager) -> i32 {
    if manager.is_null() {
        return FB_CACHE_ERROR_INVALID_PARAM;
    }
    unsafe { (*manager).0.reset() };
    FB_CACHE_SUCCESS
}

/// Get slot table statistics
#[no_mangle]
pub extern "C" fn fb_cache_get_stats(
    manager: *mut CResourceManager,
    num_slots: *mut usize,
    resident_slots: *mut usize,
    total_capacity: *mut usize,
) -> i32 {
    if manager.is_null() || num_slots.is_null() || resident_slots.is_null() || total_capacity.is_null()
    {
        return FB_CACHE_ERROR_INVALID_PARAM;
    }

    let stats = unsafe { (*manager).0.stats() };

    unsafe {
        *num_slots = stats.num_slots;
        *resident_slots = stats.resident_slots;
        *total_capacity = stats.total_capacity;
    }

    FB_CACHE_SUCCESS
}

fn error_code(err: &CacheError) -> i32 {
    match err {
        CacheError::NoFreeSlot { .. } => FB_CACHE_ERROR_NO_FREE_SLOT,
        CacheError::CapacityExceeded { .. } => FB_CACHE_ERROR_CAPACITY,
        _ => FB_CACHE_ERROR_INVALID_PARAM,
    }
}
