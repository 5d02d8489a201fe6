#![no_main]

use libfuzzer_sys::fuzz_target;

/// Interprets the input as a sequence of allocator operations.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=malloc, 1=free, 2=realloc, 3=calloc)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// Up to 64 live pointers are tracked; every live payload carries a fill
/// byte that is checked before the pointer is released or resized.
const MAX_SLOTS: usize = 64;

fuzz_target!(|data: &[u8]| {
    unsafe {
        bucketmalloc::init::ensure_initialized();
    }
    let a = bucketmalloc::init::allocator();

    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];
    let mut fills: [u8; MAX_SLOTS] = [0; MAX_SLOTS];

    let check = |p: *mut u8, size: usize, fill: u8| unsafe {
        let bytes = std::slice::from_raw_parts(p, size);
        assert!(bytes.iter().all(|&b| b == fill), "payload corrupted");
    };

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] & 0x03;
        let size = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        let fill = data[i + 3] | 1;
        i += 4;

        unsafe {
            match opcode {
                0 => {
                    if !slots[slot].is_null() {
                        check(slots[slot], sizes[slot], fills[slot]);
                        a.free(slots[slot]);
                    }
                    let p = a.malloc(size);
                    let flag = *p.sub(1);
                    assert!(flag == 0xFF || flag < 8, "bad provenance {}", flag);
                    std::ptr::write_bytes(p, fill, size);
                    slots[slot] = p;
                    sizes[slot] = size;
                    fills[slot] = fill;
                }
                1 => {
                    if !slots[slot].is_null() {
                        check(slots[slot], sizes[slot], fills[slot]);
                        a.free(slots[slot]);
                        slots[slot] = std::ptr::null_mut();
                        sizes[slot] = 0;
                    }
                }
                2 => {
                    if !slots[slot].is_null() {
                        let keep = sizes[slot].min(size);
                        let p = a.realloc(slots[slot], size);
                        check(p, keep, fills[slot]);
                        std::ptr::write_bytes(p, fills[slot], size);
                        slots[slot] = p;
                        sizes[slot] = size;
                    } else {
                        // realloc(null, _) must stay null.
                        assert!(a.realloc(std::ptr::null_mut(), size).is_null());
                    }
                }
                _ => {
                    if !slots[slot].is_null() {
                        check(slots[slot], sizes[slot], fills[slot]);
                        a.free(slots[slot]);
                    }
                    let nmemb = ((size >> 8) & 0xFF).max(1);
                    let elem = (size & 0xFF).max(1);
                    let p = a.calloc(nmemb, elem);
                    let total = nmemb * elem;
                    let bytes = std::slice::from_raw_parts(p, total);
                    assert!(bytes.iter().all(|&b| b == 0), "calloc not zeroed");
                    std::ptr::write_bytes(p, fill, total);
                    slots[slot] = p;
                    sizes[slot] = total;
                    fills[slot] = fill;
                }
            }
        }
    }

    // Cleanup
    for slot in 0..MAX_SLOTS {
        if !slots[slot].is_null() {
            check(slots[slot], sizes[slot], fills[slot]);
            unsafe { a.free(slots[slot]) };
        }
    }
});
