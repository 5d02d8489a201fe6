//! C entry points. These five symbols plus the provenance byte ahead of
//! every returned pointer are the allocator's entire binary surface. The
//! `x` prefix keeps the crate from interposing the host process's own heap:
//! slot payloads carry no alignment, so these pointers must never reach
//! code expecting malloc's alignment contract.

use crate::init;
use core::ffi::c_void;

#[no_mangle]
pub unsafe extern "C" fn xmalloc(size: usize) -> *mut c_void {
    init::ensure_initialized();
    init::allocator().malloc(size) as *mut c_void
}

#[no_mangle]
pub unsafe extern "C" fn xfree(ptr: *mut c_void) {
    // A non-null pointer implies an earlier allocation already initialized
    // the allocator.
    init::allocator().free(ptr as *mut u8);
}

#[no_mangle]
pub unsafe extern "C" fn xrealloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    init::ensure_initialized();
    init::allocator().realloc(ptr as *mut u8, size) as *mut c_void
}

#[no_mangle]
pub unsafe extern "C" fn xcalloc(nmemb: usize, size: usize) -> *mut c_void {
    init::ensure_initialized();
    init::allocator().calloc(nmemb, size) as *mut c_void
}

#[no_mangle]
pub unsafe extern "C" fn xmalloc_usable_size(ptr: *const c_void) -> usize {
    init::allocator().usable_size(ptr as *const u8)
}
