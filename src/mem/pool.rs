//! Pool allocation policy: fixed-size chunks tracked by a free list of
//! chunk offsets (spec §4.A "Pool"). Acquire pops, release pushes — an
//! O(1) stack of addresses, same as the source engine's intrusive list but
//! stored in a plain `Vec` per the REDESIGN FLAGS.

use std::cell::RefCell;
use std::ptr::NonNull;

use crate::error::OutOfMemory;
use crate::mem::arena::Arena;
use crate::Result;

pub(crate) fn alloc(arena: &Arena<'_>, free_chunks: &RefCell<Vec<usize>>, chunk_size: usize) -> Result<NonNull<u8>> {
    let offset = free_chunks
        .borrow_mut()
        .pop()
        .ok_or(OutOfMemory { requested: chunk_size, alignment: chunk_size })?;
    arena.bump_used(chunk_size);
    Ok(arena.ptr_at(offset))
}

pub(crate) fn free(arena: &Arena<'_>, free_chunks: &RefCell<Vec<usize>>, chunk_size: usize, ptr: NonNull<u8>) {
    let offset = arena.offset_of(ptr.as_ptr() as usize);
    arena.dec_used(chunk_size);
    arena.poison(offset, chunk_size);
    free_chunks.borrow_mut().push(offset);
}

#[cfg(test)]
mod tests {
    use crate::mem::free_list::Placement;
    use crate::mem::Arena;

    #[test]
    fn exact_capacity_then_one_more_fails() {
        let arena = Arena::new_pool(64, 16, None).unwrap();
        for _ in 0..4 {
            assert!(arena.alloc_raw(16, 16).is_ok());
        }
        assert!(arena.alloc_raw(16, 16).is_err());
    }

    #[test]
    fn release_then_reacquire_reuses_chunk() {
        let arena = Arena::new_pool(64, 16, None).unwrap();
        let a = arena.alloc_raw(16, 16).unwrap();
        arena.free_raw(a);
        let b = arena.alloc_raw(16, 16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unrelated_free_list_policy_is_untouched_by_pool_math() {
        // Sanity that the two policies don't share state accidentally.
        let fl = Arena::new_free_list(256, Placement::FindFirst, None).unwrap();
        assert_eq!(fl.used(), 0);
    }
}
