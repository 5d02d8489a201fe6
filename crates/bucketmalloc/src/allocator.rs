use crate::bucket::page::{self, PageHeader};
use crate::bucket::shard::{self, Shard};
use crate::bucket::size_class::{self, BUCKET_MAX, BUCKET_MIN, BUCKET_NUM, BUCKET_SIZES};
use crate::util::{ARENA_NUM, BUCKET_META_BYTES, LARGE_FLAG};
use crate::{diag, large, platform, tls};
use core::ptr;

/// The bucket allocator: a matrix of independently locked shards indexed by
/// (size class, arena), plus the large-mapping escape hatch. The matrix is
/// const-constructible so the instance lives in a plain static.
pub struct BucketAllocator {
    cells: [[Shard; ARENA_NUM]; BUCKET_NUM],
}

/// Page census for one cell, used by the verbose teardown report and by
/// tests watching bitmaps drain.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShardStats {
    pub pages: usize,
    pub fully_free: usize,
}

impl BucketAllocator {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        const SHARD: Shard = Shard::new();
        const ROW: [Shard; ARENA_NUM] = [SHARD; ARENA_NUM];
        BucketAllocator { cells: [ROW; BUCKET_NUM] }
    }

    /// Seed every cell with one fresh page so no allocate path observes an
    /// empty list.
    ///
    /// # Safety
    /// Must run single-threaded, before any allocation.
    pub unsafe fn prewarm(&self) {
        for class in 0..BUCKET_NUM {
            for arena in 0..ARENA_NUM {
                let pg = page::create(class);
                let mut head = self.cells[class][arena].lock();
                shard::push_page(&mut head, pg);
            }
        }
    }

    /// Allocate `size` bytes. Never returns null; an unsatisfiable request
    /// aborts the process.
    ///
    /// # Safety
    /// The allocator must be initialized.
    pub unsafe fn malloc(&self, size: usize) -> *mut u8 {
        if size > BUCKET_MAX {
            return large::alloc(size);
        }
        self.pop_slot(size_class::class_index(size))
    }

    /// Take one slot from `class`, preferring the calling thread's favorite
    /// arena and rolling the favorite forward one shard on contention.
    unsafe fn pop_slot(&self, class: usize) -> *mut u8 {
        let row = &self.cells[class];
        let mut arena = tls::favorite(class);
        let mut head = match row[arena].try_lock() {
            Some(guard) => guard,
            None => {
                arena = (arena + 1) % ARENA_NUM;
                tls::set_favorite(class, arena);
                row[arena].lock()
            }
        };

        let slots = page::slot_count(class);
        let mut pg = *head;
        while !pg.is_null() {
            if let Some(slot) = (*pg).acquire_slot(slots) {
                return stamp_slot(pg, class, slot, arena);
            }
            pg = (*pg).next;
        }

        // Every listed page is full. The lock stays held across the mapping
        // so two threads cannot both push a page onto the same exhausted
        // cell.
        let pg = page::create(class);
        shard::push_page(&mut head, pg);
        match (*pg).acquire_slot(slots) {
            Some(slot) => stamp_slot(pg, class, slot, arena),
            None => diag::fatal("bucketmalloc: fresh page has no free slot"),
        }
    }

    /// Release `p`. Null is a no-op; a trampled provenance byte aborts.
    ///
    /// # Safety
    /// `p` must be null or a live pointer returned by this allocator.
    pub unsafe fn free(&self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        let flag = *p.sub(1);
        if flag == LARGE_FLAG {
            large::free(p);
            return;
        }
        if flag as usize >= ARENA_NUM {
            diag::fatal_provenance("bucketmalloc: bad provenance byte on free", p, flag);
        }

        let (pg, class) = resolve_bucket(p);
        let slots = page::slot_count(class);
        let slot = page::slot_of_payload(pg, class, p);
        if slot >= slots {
            diag::fatal_ptr("bucketmalloc: slot offset out of range for ", p);
        }

        // Address-pinned: the cell is named by the pointer's own arena byte,
        // not the freeing thread's favorite.
        let _head = self.cells[class][flag as usize].lock();
        (*pg).release_slot(slot);
        #[cfg(feature = "empty-page-advise")]
        if (*pg).is_empty(slots) {
            // The mapping stays listed for reuse; only the physical backing
            // of the slot area goes back to the host.
            let len = size_class::mapping_len(class);
            let area = (pg as *mut u8).add(page::HEADER_RESERVE);
            if !platform::advise_unneeded(area, len - page::HEADER_RESERVE) {
                diag::fatal_ptr("bucketmalloc: madvise failed for idle page at ", pg as *const u8);
            }
        }
    }

    /// Resize `prev`. Null in, null out. The pointer stays put whenever the
    /// new size lands in the same occupancy band as the old allocation:
    /// within [3/4 len, len] of a large mapping, or within the same bucket
    /// without shrinking below 2/3 of it.
    ///
    /// # Safety
    /// `prev` must be null or a live pointer returned by this allocator.
    pub unsafe fn realloc(&self, prev: *mut u8, size: usize) -> *mut u8 {
        if prev.is_null() {
            return prev;
        }
        let flag = *prev.sub(1);

        if flag == LARGE_FLAG {
            let old_len = large::mapping_len(prev);
            if size <= old_len && size >= (3 * old_len + 3) / 4 {
                return prev;
            }
            let fresh = self.malloc(size);
            let copy = size.min(old_len - crate::util::LARGE_META_BYTES);
            ptr::copy_nonoverlapping(prev, fresh, copy);
            self.free(prev);
            return fresh;
        }

        if flag as usize >= ARENA_NUM {
            diag::fatal_provenance("bucketmalloc: bad provenance byte on realloc", prev, flag);
        }

        let (_, class) = resolve_bucket(prev);
        let old_size = BUCKET_SIZES[class];
        let shrunk_out = size < (2 * old_size + 2) / 3 && old_size != BUCKET_MIN;
        if size > BUCKET_MAX || size > old_size || shrunk_out {
            let fresh = self.malloc(size);
            ptr::copy_nonoverlapping(prev, fresh, size.min(old_size));
            self.free(prev);
            return fresh;
        }
        prev
    }

    /// Allocate zeroed memory for an `nmemb * size` array. Returns null when
    /// the product overflows; slots are recycled unzeroed, so the payload is
    /// cleared explicitly.
    ///
    /// # Safety
    /// The allocator must be initialized.
    pub unsafe fn calloc(&self, nmemb: usize, size: usize) -> *mut u8 {
        let total = match nmemb.checked_mul(size) {
            Some(t) => t,
            None => return ptr::null_mut(),
        };
        let p = self.malloc(total);
        ptr::write_bytes(p, 0, total);
        p
    }

    /// Usable payload bytes behind `p`: the bucket size for bucketed
    /// pointers, the mapping remainder for large ones, 0 for null.
    ///
    /// # Safety
    /// `p` must be null or a live pointer returned by this allocator.
    pub unsafe fn usable_size(&self, p: *const u8) -> usize {
        if p.is_null() {
            return 0;
        }
        let flag = *p.sub(1);
        if flag == LARGE_FLAG {
            return large::usable_size(p);
        }
        if flag as usize >= ARENA_NUM {
            diag::fatal_provenance("bucketmalloc: bad provenance byte on size query", p, flag);
        }
        let (_, class) = resolve_bucket(p);
        BUCKET_SIZES[class]
    }

    /// Count the pages of cell `(class, arena)` and how many hold no live
    /// slot.
    pub fn shard_stats(&self, class: usize, arena: usize) -> ShardStats {
        let slots = page::slot_count(class);
        let head = self.cells[class][arena].lock();
        let mut stats = ShardStats::default();
        let mut pg = *head;
        while !pg.is_null() {
            stats.pages += 1;
            unsafe {
                if (*pg).is_empty(slots) {
                    stats.fully_free += 1;
                }
                pg = (*pg).next;
            }
        }
        stats
    }

    /// Return every mapping to the host. Best-effort: a rejected munmap is
    /// reported and skipped. Runs as the process exits, so the shard lists
    /// are left pointing at the dead mappings.
    ///
    /// # Safety
    /// No allocator call may follow; the process is expected to exit.
    pub unsafe fn teardown(&self) {
        let mut released = 0usize;
        for class in 0..BUCKET_NUM {
            let len = size_class::mapping_len(class);
            for arena in 0..ARENA_NUM {
                let head = self.cells[class][arena].lock();
                let mut pg = *head;
                while !pg.is_null() {
                    let next = (*pg).next;
                    if platform::unmap(pg as *mut u8, len) {
                        released += 1;
                    } else {
                        diag::warn_ptr(
                            "bucketmalloc: munmap failed during teardown at ",
                            pg as *const u8,
                        );
                    }
                    pg = next;
                }
            }
        }
        diag::note_count("bucketmalloc: teardown released mappings: ", released);
    }
}

/// Stamp the bucket metadata ahead of the payload and return the payload
/// address: a u32 offset from the page start to the slot start, then the
/// arena index as the provenance byte. Slot starts have no alignment, so
/// the u32 goes through an unaligned write.
unsafe fn stamp_slot(pg: *mut PageHeader, class: usize, slot: u32, arena: usize) -> *mut u8 {
    let base = page::slot_base(pg, class, slot);
    (base as *mut u32).write_unaligned((base as usize - pg as usize) as u32);
    base.add(4).write(arena as u8);
    base.add(BUCKET_META_BYTES)
}

/// Recover the owning page and class index for the bucketed pointer `p`.
/// The class tag is immutable, so no lock is needed yet; a tag that decodes
/// to nothing in the table means the metadata was trampled.
unsafe fn resolve_bucket(p: *const u8) -> (*mut PageHeader, usize) {
    let offset = (p.sub(BUCKET_META_BYTES) as *const u32).read_unaligned() as usize;
    let pg = p.sub(BUCKET_META_BYTES).sub(offset) as *mut PageHeader;
    let class_bytes = size_class::decode_class((*pg).class_tag);
    match size_class::exact_class_index(class_bytes) {
        Some(c) => (pg, c),
        None => diag::fatal_provenance(
            "bucketmalloc: bad class tag behind pointer",
            p,
            (*pg).class_tag,
        ),
    }
}
