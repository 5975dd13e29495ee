//! Process-wide well-known arenas (spec §4.A "Process-wide well-known
//! arenas"), replacing the source's global mutable arena pointers with an
//! explicit context struct per REDESIGN FLAGS ("global mutable arena
//! pointers → explicit context struct passed down").
//!
//! A `Context` owns the three arenas named by spec.md §4.A: a free-list
//! arena for general long-lived allocations, a stack arena for scoped
//! scratch work, and a linear arena reset once per frame. Call sites that
//! would otherwise reach for a global (`get_general_arena()` in the source)
//! instead take `&Context` or one of its arena references as an explicit
//! parameter.

use crate::mem::free_list::Placement;
use crate::mem::Arena;
use crate::Result;

/// Default sizes from spec §6 "Memory init".
pub const DEFAULT_FREE_LIST_SIZE: usize = 4 * 1024 * 1024 * 1024;
pub const DEFAULT_STACK_SIZE: usize = 100 * 1024 * 1024;
pub const DEFAULT_FRAME_LINEAR_SIZE: usize = 100 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct MemoryInit {
    pub free_list_size: usize,
    pub stack_size: usize,
    pub frame_linear_size: usize,
}

impl Default for MemoryInit {
    fn default() -> Self {
        Self {
            free_list_size: DEFAULT_FREE_LIST_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            frame_linear_size: DEFAULT_FRAME_LINEAR_SIZE,
        }
    }
}

/// The three well-known arenas, owned for the lifetime of the application.
pub struct Context {
    general: Arena<'static>,
    scratch: Arena<'static>,
    frame_linear: Arena<'static>,
}

impl Context {
    pub fn new(init: &MemoryInit) -> Result<Self> {
        Ok(Self {
            general: Arena::new_free_list(init.free_list_size, Placement::FindFirst, None)?,
            scratch: Arena::new_stack(init.stack_size, None)?,
            frame_linear: Arena::new_linear(init.frame_linear_size, None)?,
        })
    }

    /// The general-purpose free-list arena, for allocations with no
    /// particular lifetime affinity.
    pub fn general(&self) -> &Arena<'static> {
        &self.general
    }

    /// The scoped scratch stack arena; callers must free in LIFO order.
    pub fn scratch(&self) -> &Arena<'static> {
        &self.scratch
    }

    /// The per-frame linear arena; reset once per tick by the frame loop
    /// (spec §4.M step iii).
    pub fn frame_linear(&self) -> &Arena<'static> {
        &self.frame_linear
    }

    /// Resets the per-frame linear arena. Called by `renderer::FrameLoop`
    /// at the start of every tick.
    pub fn reset_frame_linear(&self) {
        self.frame_linear.reset();
    }
}
