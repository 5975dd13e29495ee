//! Dynamic containers that grow inside an [`super::Arena`] rather than the
//! process allocator (spec §4.B). Every container (`ArenaVec`,
//! `ArenaHashMap`, `SlotPool`) carries a reference to the arena it grows in
//! and routes every resize through that arena's `alloc_raw`/`free_raw`; none
//! of them falls back to a process-global allocator. Callers that want the
//! process-wide well-known arenas (see [`crate::context`]) pass one of
//! `Context`'s arena references explicitly at construction time.

pub mod array;
pub mod hash_map;
pub mod slot_pool;

pub use array::ArenaVec;
pub use hash_map::ArenaHashMap;
pub use slot_pool::{SlotHandle, SlotPool};
