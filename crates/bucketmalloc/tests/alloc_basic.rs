//! Front-door behavior: allocation round-trips, realloc banding, calloc,
//! usable size, and the C entry points.

use bucketmalloc::allocator::BucketAllocator;
use core::ffi::c_void;
use std::ptr;

unsafe fn alloc() -> &'static BucketAllocator {
    bucketmalloc::init::ensure_initialized();
    bucketmalloc::init::allocator()
}

#[test]
fn zero_size_request_lands_in_the_smallest_bucket() {
    unsafe {
        let a = alloc();
        let p = a.malloc(0);
        assert!(!p.is_null());
        assert_eq!(a.usable_size(p), 8);
        // The whole bucket is writable.
        ptr::write_bytes(p, 0xA5, 8);
        a.free(p);
    }
}

#[test]
fn free_null_is_a_noop() {
    unsafe {
        alloc().free(ptr::null_mut());
    }
}

#[test]
fn realloc_null_returns_null() {
    unsafe {
        assert!(alloc().realloc(ptr::null_mut(), 128).is_null());
    }
}

#[test]
fn written_bytes_survive_until_free() {
    unsafe {
        let a = alloc();
        let sizes = [1usize, 8, 100, 1024, 4096, 8192, 16384, 70000];
        let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();

        for (i, &size) in sizes.iter().enumerate() {
            let p = a.malloc(size);
            let pattern = (0x11 * (i + 1)) as u8;
            ptr::write_bytes(p, pattern, size);
            live.push((p, size, pattern));
        }
        // Interleave with more traffic before verifying.
        for _ in 0..100 {
            let p = a.malloc(64);
            a.free(p);
        }
        for (p, size, pattern) in live {
            let bytes = std::slice::from_raw_parts(p, size);
            assert!(bytes.iter().all(|&b| b == pattern), "size {}", size);
            a.free(p);
        }
    }
}

#[test]
fn live_allocations_never_overlap() {
    unsafe {
        let a = alloc();
        let mut live: Vec<(usize, usize)> = Vec::new();
        for &size in &[24usize, 100, 100, 2000, 2000, 9000, 24, 512] {
            let p = a.malloc(size) as usize;
            let cap = a.usable_size(p as *const u8);
            for &(q, qcap) in &live {
                assert!(p + cap <= q || q + qcap <= p, "payloads alias");
            }
            live.push((p, cap));
        }
        for (p, _) in live {
            a.free(p as *mut u8);
        }
    }
}

#[test]
fn realloc_stays_within_its_bucket() {
    unsafe {
        let a = alloc();
        // 100 bytes sits in the 128 bucket.
        let p = a.malloc(100);
        assert_eq!(a.usable_size(p), 128);
        ptr::write_bytes(p, 0x42, 120);

        // Still inside [2/3 * 128, 128]: same pointer.
        let q = a.realloc(p, 120);
        assert_eq!(q, p);

        // One byte past the bucket: moved, contents preserved.
        let r = a.realloc(q, 129);
        assert_ne!(r, q);
        assert_eq!(a.usable_size(r), 192);
        let bytes = std::slice::from_raw_parts(r, 120);
        assert!(bytes.iter().all(|&b| b == 0x42));
        a.free(r);
    }
}

#[test]
fn realloc_shrink_drops_to_a_smaller_bucket() {
    unsafe {
        let a = alloc();
        // 1000 bytes sits in the 1024 bucket; 600 < ceil(2*1024/3) = 683,
        // so the shrink must move into the 768 bucket.
        let p = a.malloc(1000);
        ptr::write_bytes(p, 0x7C, 1000);
        let q = a.realloc(p, 600);
        assert_ne!(q, p);
        assert_eq!(a.usable_size(q), 768);
        let bytes = std::slice::from_raw_parts(q, 600);
        assert!(bytes.iter().all(|&b| b == 0x7C));
        a.free(q);
    }
}

#[test]
fn realloc_shrink_inside_the_band_stays_put() {
    unsafe {
        let a = alloc();
        let p = a.malloc(1000);
        // 700 >= 683: same bucket, same pointer.
        let q = a.realloc(p, 700);
        assert_eq!(q, p);
        // The smallest bucket never relocates on shrink.
        let s = a.malloc(8);
        let t = a.realloc(s, 1);
        assert_eq!(t, s);
        a.free(t);
        a.free(q);
    }
}

#[test]
fn realloc_large_banding() {
    unsafe {
        let a = alloc();
        // 20,000 + 9 rounds to a 20,480-byte mapping.
        let p = a.malloc(20_000);
        ptr::write_bytes(p, 0x33, 20_000);

        // ceil(3 * 20480 / 4) = 15360: anything in [15360, 20480] stays.
        let q = a.realloc(p, 16_000);
        assert_eq!(q, p);

        // Below the band: moved to a smaller mapping, contents preserved.
        let r = a.realloc(q, 12_000);
        assert_ne!(r, q);
        assert_eq!(*r.sub(1), 0xFF);
        let bytes = std::slice::from_raw_parts(r, 12_000);
        assert!(bytes.iter().all(|&b| b == 0x33));

        // Growth always moves.
        let s = a.realloc(r, 40_000);
        assert_ne!(s, r);
        let bytes = std::slice::from_raw_parts(s, 12_000);
        assert!(bytes.iter().all(|&b| b == 0x33));
        a.free(s);
    }
}

#[test]
fn realloc_crosses_between_buckets_and_large() {
    unsafe {
        let a = alloc();
        // Bucket to large.
        let p = a.malloc(5000);
        assert!((*p.sub(1)) < 8);
        ptr::write_bytes(p, 0x66, 5000);
        let q = a.realloc(p, 10_000);
        assert_eq!(*q.sub(1), 0xFF);
        let bytes = std::slice::from_raw_parts(q, 5000);
        assert!(bytes.iter().all(|&b| b == 0x66));

        // Large back to a bucket.
        let r = a.realloc(q, 200);
        assert!((*r.sub(1)) < 8);
        let bytes = std::slice::from_raw_parts(r, 200);
        assert!(bytes.iter().all(|&b| b == 0x66));
        a.free(r);
    }
}

#[test]
fn calloc_returns_zeroed_memory() {
    unsafe {
        let a = alloc();
        // Slots are recycled unzeroed, so calloc must clear explicitly.
        let p = a.malloc(950);
        ptr::write_bytes(p, 0xDD, 950);
        a.free(p);

        let q = a.calloc(10, 95);
        let bytes = std::slice::from_raw_parts(q, 950);
        assert!(bytes.iter().all(|&b| b == 0));
        a.free(q);
    }
}

#[test]
fn calloc_overflow_returns_null() {
    unsafe {
        let a = alloc();
        assert!(a.calloc(usize::MAX, 2).is_null());
    }
}

#[test]
fn usable_size_matches_the_owning_bucket() {
    unsafe {
        let a = alloc();
        assert_eq!(a.usable_size(ptr::null()), 0);
        let p = a.malloc(33);
        assert_eq!(a.usable_size(p), 48);
        a.free(p);
        let p = a.malloc(8192);
        assert_eq!(a.usable_size(p), 8192);
        a.free(p);
        let p = a.malloc(100_000);
        assert!(a.usable_size(p) >= 100_000);
        a.free(p);
    }
}

#[test]
fn c_entry_points_round_trip() {
    unsafe {
        use bucketmalloc::api::{xcalloc, xfree, xmalloc, xmalloc_usable_size, xrealloc};

        let p = xmalloc(300) as *mut u8;
        assert!(!p.is_null());
        ptr::write_bytes(p, 0x21, 300);
        assert_eq!(xmalloc_usable_size(p as *const c_void), 384);

        let q = xrealloc(p as *mut c_void, 500) as *mut u8;
        let bytes = std::slice::from_raw_parts(q, 300);
        assert!(bytes.iter().all(|&b| b == 0x21));
        xfree(q as *mut c_void);

        let z = xcalloc(16, 16) as *mut u8;
        let bytes = std::slice::from_raw_parts(z, 256);
        assert!(bytes.iter().all(|&b| b == 0));
        xfree(z as *mut c_void);

        xfree(ptr::null_mut());
    }
}
