use crate::allocator::BucketAllocator;
use crate::config;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);

static ALLOCATOR: BucketAllocator = BucketAllocator::new();

/// Library constructor -- pre-warms every cell before main().
#[used]
#[cfg_attr(target_os = "linux", link_section = ".init_array")]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_init_func")]
static CTOR: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        bucketmalloc_init();
    }
    init
};

/// Library destructor -- returns every mapping as the process exits.
#[used]
#[cfg_attr(target_os = "linux", link_section = ".fini_array")]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_term_func")]
static DTOR: unsafe extern "C" fn() = {
    unsafe extern "C" fn fini() {
        bucketmalloc_teardown();
    }
    fini
};

/// Initialize the allocator exactly once. Safe to race: losers spin until
/// the winner finishes pre-warming.
pub unsafe fn bucketmalloc_init() {
    match INIT_STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        Err(INITIALIZING) => {
            while INIT_STATE.load(Ordering::Acquire) == INITIALIZING {
                core::hint::spin_loop();
            }
            return;
        }
        Err(_) => return,
    }

    config::read_config();
    ALLOCATOR.prewarm();

    INIT_STATE.store(READY, Ordering::Release);
}

/// Release all mappings. Best-effort; runs from the destructor.
pub unsafe fn bucketmalloc_teardown() {
    if INIT_STATE.load(Ordering::Acquire) == READY {
        ALLOCATOR.teardown();
    }
}

/// Initialize if the constructor has not run yet (a caller in another
/// constructor can get here first).
#[cold]
#[inline(never)]
pub unsafe fn ensure_initialized() {
    if INIT_STATE.load(Ordering::Acquire) != READY {
        bucketmalloc_init();
    }
}

#[inline(always)]
pub fn allocator() -> &'static BucketAllocator {
    &ALLOCATOR
}
