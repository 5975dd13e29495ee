//! Stack allocation policy: monotonic bump with a per-allocation header
//! recording enough information to rewind to the previous offset (spec
//! §4.A "Stack"). Release is only valid in LIFO order relative to
//! allocation; out-of-order release is rejected by a debug assertion.

use std::cell::Cell;
use std::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::mem::arena::{calc_padding_with_header, Arena};
use crate::Result;

#[repr(C)]
#[derive(Clone, Copy)]
struct StackHeader {
    /// Bytes from the offset just before this allocation to the returned
    /// user pointer (alignment padding + header). Rewinding subtracts this
    /// from the user pointer's offset.
    padding: usize,
    /// Header offset of the allocation below this one in the LIFO chain,
    /// `None` if this was the first allocation since the last reset.
    prev_header_offset: Option<usize>,
}

const STACK_HEADER_SIZE: usize = std::mem::size_of::<StackHeader>();

/// Bookkeeping for the stack policy: the current bump offset, and the
/// header address of the most recent allocation (used to assert LIFO
/// release order in debug builds).
#[derive(Clone, Copy, Default)]
pub(crate) struct StackState {
    offset: usize,
    last_header_offset: Option<usize>,
}

pub(crate) fn alloc(arena: &Arena<'_>, state: &Cell<StackState>, size: usize, alignment: usize) -> Result<NonNull<u8>> {
    let mut s = state.get();
    let base_addr = arena.ptr_at(0).as_ptr() as usize + s.offset;
    let padding = calc_padding_with_header(base_addr, alignment, STACK_HEADER_SIZE);

    if s.offset + padding + size > arena.capacity() {
        return Err(OutOfMemory { requested: size, alignment }.into());
    }

    let user_offset = s.offset + padding;
    let header_offset = user_offset - STACK_HEADER_SIZE;
    unsafe {
        let header_ptr = arena.ptr_at(header_offset).as_ptr() as *mut StackHeader;
        header_ptr.write(StackHeader { padding, prev_header_offset: s.last_header_offset });
    }

    s.offset += padding + size;
    s.last_header_offset = Some(header_offset);
    state.set(s);
    arena.set_used(s.offset);
    Ok(arena.ptr_at(user_offset))
}

pub(crate) fn free(arena: &Arena<'_>, state: &Cell<StackState>, ptr: NonNull<u8>) {
    let mut s = state.get();
    let user_offset = arena.offset_of(ptr.as_ptr() as usize);
    let header_offset = user_offset - STACK_HEADER_SIZE;

    debug_assert_eq!(
        s.last_header_offset,
        Some(header_offset),
        "stack arena free() called out of LIFO order"
    );

    let header = unsafe { *(arena.ptr_at(header_offset).as_ptr() as *const StackHeader) };
    let new_offset = user_offset - header.padding;
    arena.poison(new_offset, s.offset - new_offset);
    s.offset = new_offset;
    s.last_header_offset = header.prev_header_offset;
    state.set(s);
    arena.set_used(s.offset);
}

#[cfg(test)]
mod tests {
    use crate::mem::Arena;

    #[test]
    fn lifo_free_rewinds_offset() {
        let arena = Arena::new_stack(1024, None).unwrap();
        let a = arena.alloc_raw(32, 8).unwrap();
        let used_after_a = arena.used();
        let b = arena.alloc_raw(32, 8).unwrap();
        assert!(arena.used() > used_after_a);
        arena.free_raw(b);
        assert_eq!(arena.used(), used_after_a);
        arena.free_raw(a);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    #[should_panic(expected = "LIFO order")]
    fn out_of_order_free_panics_in_debug() {
        let arena = Arena::new_stack(1024, None).unwrap();
        let a = arena.alloc_raw(32, 8).unwrap();
        let _b = arena.alloc_raw(32, 8).unwrap();
        arena.free_raw(a);
    }
}
