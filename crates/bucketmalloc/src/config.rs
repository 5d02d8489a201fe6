use core::sync::atomic::{AtomicBool, Ordering};
use std::ffi::CStr;

/// Cached at init; the hot paths only ever read the atomic.
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Read configuration from the environment. Called once during init,
/// before any mutator thread exists.
///
/// # Safety
/// libc::getenv is not thread-safe, so this must run single-threaded.
pub unsafe fn read_config() {
    VERBOSE.store(env_flag("BUCKETMALLOC_VERBOSE\0"), Ordering::Relaxed);
}

pub fn verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// True when the variable is set to a nonzero decimal value. Unset, empty,
/// zero, or non-numeric values all read as off. Borrows the environment
/// block in place; nothing allocates.
///
/// # Safety
/// Calls libc::getenv; `name` must be nul-terminated.
unsafe fn env_flag(name: &str) -> bool {
    let raw = libc::getenv(name.as_ptr() as *const libc::c_char);
    if raw.is_null() {
        return false;
    }
    let value = CStr::from_ptr(raw).to_bytes();
    !value.is_empty()
        && value.iter().all(|b| b.is_ascii_digit())
        && value.iter().any(|&b| b != b'0')
}
