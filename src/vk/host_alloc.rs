//! Vulkan host-allocation bridge (spec §4.C), routing every driver host
//! allocation through the arena subsystem instead of `malloc`/`free`.
//! Per REDESIGN FLAGS ("Vulkan host-alloc callbacks reaching into process
//! globals → carry the arena pair via Vulkan's `pUserData`"), the bridge is
//! recovered from `VkAllocationCallbacks.pUserData` inside each trampoline;
//! nothing here touches a global.

use std::ffi::c_void;
use std::ptr::NonNull;

use vulkanalia::vk;

use crate::mem::Arena;

/// Per-scope allocation statistics (spec §4.C "Per-scope statistics"),
/// logged on teardown.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopeStats {
    pub alloc_count: u64,
    pub free_count: u64,
    pub realloc_count: u64,
    pub requested_alloc_bytes: u64,
    pub requested_free_bytes: u64,
    pub actual_alloc_bytes: u64,
    pub actual_free_bytes: u64,
}

const SCOPE_COUNT: usize = 6;

fn scope_index(scope: vk::SystemAllocationScope) -> usize {
    match scope {
        vk::SystemAllocationScope::COMMAND => 0,
        vk::SystemAllocationScope::OBJECT => 1,
        vk::SystemAllocationScope::CACHE => 2,
        vk::SystemAllocationScope::DEVICE => 3,
        vk::SystemAllocationScope::INSTANCE => 4,
        _ => 5,
    }
}

/// Header written ahead of every host allocation, recording enough to
/// charge the matching `free`/`realloc` back to the scope and arena it came
/// from (spec §4.C "writes `{scope, requested-size}` into the header").
#[repr(C)]
struct HostAllocHeader {
    scope: vk::SystemAllocationScope,
    requested_size: usize,
}

const HEADER_SIZE: usize = std::mem::size_of::<HostAllocHeader>();

/// Bridges Vulkan's three allocation callbacks into a command arena (for
/// `COMMAND`-scoped allocations) and a persistent free-list arena (for
/// everything else).
pub struct HostAllocBridge<'a> {
    command_arena: &'a Arena<'a>,
    persistent_arena: &'a Arena<'a>,
    stats: [std::cell::Cell<ScopeStats>; SCOPE_COUNT],
}

impl<'a> HostAllocBridge<'a> {
    pub fn new(command_arena: &'a Arena<'a>, persistent_arena: &'a Arena<'a>) -> Self {
        Self { command_arena, persistent_arena, stats: Default::default() }
    }

    fn arena_for(&self, scope: vk::SystemAllocationScope) -> &'a Arena<'a> {
        if scope == vk::SystemAllocationScope::COMMAND {
            self.command_arena
        } else {
            self.persistent_arena
        }
    }

    fn record_alloc(&self, scope: vk::SystemAllocationScope, requested: usize, actual: usize) {
        let idx = scope_index(scope);
        let mut s = self.stats[idx].get();
        s.alloc_count += 1;
        s.requested_alloc_bytes += requested as u64;
        s.actual_alloc_bytes += actual as u64;
        self.stats[idx].set(s);
    }

    fn record_free(&self, scope: vk::SystemAllocationScope, requested: usize, actual: usize) {
        let idx = scope_index(scope);
        let mut s = self.stats[idx].get();
        s.free_count += 1;
        s.requested_free_bytes += requested as u64;
        s.actual_free_bytes += actual as u64;
        self.stats[idx].set(s);
    }

    fn record_realloc(&self, scope: vk::SystemAllocationScope) {
        self.stats[scope_index(scope)].set({
            let mut s = self.stats[scope_index(scope)].get();
            s.realloc_count += 1;
            s
        });
    }

    pub fn stats(&self, scope: vk::SystemAllocationScope) -> ScopeStats {
        self.stats[scope_index(scope)].get()
    }

    /// Logs every scope's accounting at `info` level (spec §4.C "logged on
    /// teardown").
    pub fn log_teardown_stats(&self) {
        for (i, cell) in self.stats.iter().enumerate() {
            let s = cell.get();
            log::info!(
                "host-alloc scope {}: allocs={} frees={} reallocs={} req_alloc={} req_free={} act_alloc={} act_free={}",
                i,
                s.alloc_count,
                s.free_count,
                s.realloc_count,
                s.requested_alloc_bytes,
                s.requested_free_bytes,
                s.actual_alloc_bytes,
                s.actual_free_bytes
            );
        }
    }

    fn do_alloc(&self, size: usize, alignment: usize, scope: vk::SystemAllocationScope) -> *mut c_void {
        let arena = self.arena_for(scope);
        match arena.alloc_raw(size + HEADER_SIZE, alignment) {
            Ok(ptr) => unsafe {
                let header_ptr = ptr.as_ptr() as *mut HostAllocHeader;
                header_ptr.write(HostAllocHeader { scope, requested_size: size });
                let user_ptr = ptr.as_ptr().add(HEADER_SIZE);
                self.record_alloc(scope, size, arena.block_size(ptr));
                user_ptr as *mut c_void
            },
            Err(_) => std::ptr::null_mut(),
        }
    }

    fn do_free(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let user_ptr = ptr as *mut u8;
            let header_ptr = user_ptr.sub(HEADER_SIZE) as *const HostAllocHeader;
            let scope = (*header_ptr).scope;
            let requested = (*header_ptr).requested_size;
            let block_ptr = NonNull::new_unchecked(header_ptr as *mut u8);
            let arena = self.arena_for(scope);
            let actual = arena.block_size(block_ptr);
            arena.free_raw(block_ptr);
            self.record_free(scope, requested, actual);
        }
    }

    fn do_realloc(&self, original: *mut c_void, size: usize, alignment: usize, scope: vk::SystemAllocationScope) -> *mut c_void {
        if original.is_null() {
            return self.do_alloc(size, alignment, scope);
        }
        unsafe {
            let user_ptr = original as *mut u8;
            let header_ptr = user_ptr.sub(HEADER_SIZE) as *mut HostAllocHeader;
            debug_assert_eq!((*header_ptr).scope, scope, "realloc scope must match the original allocation's scope");
            let block_ptr = NonNull::new_unchecked(header_ptr as *mut u8);
            let arena = self.arena_for(scope);
            match arena.realloc_raw(block_ptr, size + HEADER_SIZE, alignment, true) {
                Ok(new_ptr) => {
                    let new_header = new_ptr.as_ptr() as *mut HostAllocHeader;
                    new_header.write(HostAllocHeader { scope, requested_size: size });
                    self.record_realloc(scope);
                    new_ptr.as_ptr().add(HEADER_SIZE) as *mut c_void
                }
                Err(_) => std::ptr::null_mut(),
            }
        }
    }

    /// Builds the `VkAllocationCallbacks` wired to this bridge's trampolines.
    /// `self` must outlive the Vulkan object(s) created with the returned
    /// struct.
    pub fn as_vk_callbacks(&self) -> vk::AllocationCallbacks {
        vk::AllocationCallbacks {
            user_data: self as *const Self as *mut c_void,
            pfn_allocation: Some(trampoline_alloc),
            pfn_reallocation: Some(trampoline_realloc),
            pfn_free: Some(trampoline_free),
            pfn_internal_allocation: None,
            pfn_internal_free: None,
        }
    }
}

unsafe extern "system" fn trampoline_alloc(
    user_data: *mut c_void,
    size: usize,
    alignment: usize,
    scope: vk::SystemAllocationScope,
) -> *mut c_void {
    let bridge = &*(user_data as *const HostAllocBridge);
    bridge.do_alloc(size, alignment, scope)
}

unsafe extern "system" fn trampoline_realloc(
    user_data: *mut c_void,
    original: *mut c_void,
    size: usize,
    alignment: usize,
    scope: vk::SystemAllocationScope,
) -> *mut c_void {
    let bridge = &*(user_data as *const HostAllocBridge);
    bridge.do_realloc(original, size, alignment, scope)
}

unsafe extern "system" fn trampoline_free(user_data: *mut c_void, memory: *mut c_void) {
    let bridge = &*(user_data as *const HostAllocBridge);
    bridge.do_free(memory)
}
