//! Dedicated mappings for requests past the largest bucket. The provenance
//! protocol is carried in-band: the first 8 bytes of the mapping hold its
//! total length, the ninth byte holds the 0xFF flag, and the payload
//! follows. No table tracks these mappings; the header is the whole record.

use crate::diag;
use crate::platform;
use crate::util::{align_up, LARGE_FLAG, LARGE_META_BYTES, PAGE_SIZE};

/// Map a region for an oversized request and return its payload address.
/// Fatal when the host refuses the mapping.
pub unsafe fn alloc(size: usize) -> *mut u8 {
    let len = align_up(size + LARGE_META_BYTES, PAGE_SIZE);
    let base = platform::map_anonymous(len);
    if base.is_null() {
        diag::fatal_len("bucketmalloc: mmap failed for large request of len ", len);
    }
    // The base is page-aligned, so the u64 write is too.
    (base as *mut u64).write(len as u64);
    base.add(8).write(LARGE_FLAG);
    base.add(LARGE_META_BYTES)
}

/// Total mapping length recorded ahead of `payload`.
///
/// # Safety
/// `payload` must have been returned by `alloc` and still be live.
#[inline]
pub unsafe fn mapping_len(payload: *const u8) -> usize {
    (payload.sub(LARGE_META_BYTES) as *const u64).read() as usize
}

/// Usable payload bytes of the mapping owning `payload`.
///
/// # Safety
/// Same as `mapping_len`.
#[inline]
pub unsafe fn usable_size(payload: *const u8) -> usize {
    mapping_len(payload) - LARGE_META_BYTES
}

/// Unmap the mapping that owns `payload`. Fatal if the kernel rejects the
/// range; a bad length here means the header was trampled.
///
/// # Safety
/// `payload` must have been returned by `alloc` and not freed since.
pub unsafe fn free(payload: *mut u8) {
    let base = payload.sub(LARGE_META_BYTES);
    let len = (base as *const u64).read() as usize;
    if !platform::unmap(base, len) {
        diag::fatal_ptr("bucketmalloc: munmap failed for large mapping at ", base);
    }
}
