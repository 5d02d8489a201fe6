//! Per-thread favorite-arena hints, one byte per size class.

use crate::bucket::size_class::BUCKET_NUM;
use core::cell::Cell;

thread_local! {
    /// Every thread starts with arena 0 for every class and rolls forward
    /// when its favorite cell is contended.
    static FAVORITE_ARENAS: Cell<[u8; BUCKET_NUM]> = const { Cell::new([0; BUCKET_NUM]) };
}

/// The calling thread's preferred arena for `class`. Falls back to arena 0
/// when TLS is unavailable (thread teardown).
#[inline]
pub fn favorite(class: usize) -> usize {
    FAVORITE_ARENAS
        .try_with(|f| f.get()[class] as usize)
        .unwrap_or(0)
}

/// Persist a new favorite arena for `class`.
#[inline]
pub fn set_favorite(class: usize, arena: usize) {
    let _ = FAVORITE_ARENAS.try_with(|f| {
        let mut all = f.get();
        all[class] = arena as u8;
        f.set(all);
    });
}
