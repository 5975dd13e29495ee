//! Linear allocation policy: monotonic bump using the same header shape as
//! the free-list policy, so `realloc` can be implemented uniformly across
//! the two (spec §4.A "Linear"). Individual releases are a no-op; only
//! `Arena::reset` reclaims the whole region.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::mem::arena::{calc_padding_with_header, Arena, AllocHeader, ALLOC_HEADER_SIZE};
use crate::Result;

pub(crate) fn alloc(arena: &Arena<'_>, offset: &Cell<usize>, size: usize, alignment: usize) -> Result<NonNull<u8>> {
    let cur = offset.get();
    let block_addr = arena.ptr_at(0).as_ptr() as usize + cur;
    let padding = calc_padding_with_header(block_addr, alignment, ALLOC_HEADER_SIZE);

    if cur + padding + size > arena.capacity() {
        return Err(OutOfMemory { requested: size, alignment }.into());
    }

    let alignment_padding = padding - ALLOC_HEADER_SIZE;
    let header_offset = cur + alignment_padding;
    arena.write_header(arena.ptr_at(header_offset), AllocHeader { block_size: padding + size, alignment_padding });

    let new_offset = cur + padding + size;
    offset.set(new_offset);
    arena.set_used(new_offset);
    Ok(arena.ptr_at(header_offset + ALLOC_HEADER_SIZE))
}

/// Linear arenas never release individual allocations.
pub(crate) fn free() {}
