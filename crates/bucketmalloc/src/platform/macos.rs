use core::ptr;

/// Map anonymous read-write memory. Returns null on failure.
///
/// # Safety
/// `len` must be page-aligned and non-zero.
pub unsafe fn map_anonymous(len: usize) -> *mut u8 {
    let result = libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if result == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        result as *mut u8
    }
}

/// Unmap memory. Returns false when the kernel rejects the range.
///
/// # Safety
/// `ptr` must have been returned by `map_anonymous` with the same `len`.
pub unsafe fn unmap(ptr: *mut u8, len: usize) -> bool {
    libc::munmap(ptr as *mut libc::c_void, len) == 0
}

/// Drop the physical backing of a range.
///
/// On macOS, MADV_DONTNEED is advisory-only and does not guarantee
/// zero-filled pages on reuse. Replace the range with fresh anonymous
/// pages via mmap(MAP_FIXED), matching the zero-fill contract that Linux
/// MADV_DONTNEED provides.
///
/// # Safety
/// Region must be valid and page-aligned.
pub unsafe fn advise_unneeded(ptr: *mut u8, len: usize) -> bool {
    let ret = libc::mmap(
        ptr as *mut libc::c_void,
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
        -1,
        0,
    );
    ret != libc::MAP_FAILED
}
