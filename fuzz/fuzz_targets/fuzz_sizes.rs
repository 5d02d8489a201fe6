#![no_main]

use libfuzzer_sys::fuzz_target;

/// Interprets the input as a stream of little-endian u24 sizes, allocates
/// them all, then frees in allocation order. Exercises the class lookup
/// boundaries and the bucket/large split across arbitrary size mixes.
fuzz_target!(|data: &[u8]| {
    unsafe {
        bucketmalloc::init::ensure_initialized();
    }
    let a = bucketmalloc::init::allocator();

    let mut live: Vec<(*mut u8, usize)> = Vec::new();

    for chunk in data.chunks_exact(3).take(256) {
        let size = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], 0]) as usize;
        unsafe {
            let p = a.malloc(size);
            let flag = *p.sub(1);
            if size > 8192 {
                assert_eq!(flag, 0xFF);
            } else {
                assert!(flag < 8, "bad provenance {}", flag);
            }
            assert!(a.usable_size(p) >= size.max(8));
            // Touch both ends of the payload.
            if size > 0 {
                p.write(0xAB);
                p.add(size - 1).write(0xBA);
            }
            live.push((p, size));
        }
    }

    for (p, size) in live {
        unsafe {
            if size > 0 {
                assert_eq!(*p, 0xAB);
                assert_eq!(*p.add(size - 1), 0xBA);
            }
            a.free(p);
        }
    }
});
