#![no_main]

use libfuzzer_sys::fuzz_target;
use tabstream_wire::GzipInflater;

// Fuzz target: GzipInflater on arbitrary bytes fed in two pieces.
//
// Input format:
//   byte 0: split offset into the rest
//   bytes 1..: body, usually garbage after a forced gzip magic
//
// Catches bugs in:
// - Header parsing across feed boundaries
// - Fragment sizing (no fragment over the chunk size)
// - Trailing-byte accounting after the member ends
// - Trailer validation in finish
fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let mut body = vec![0x1F, 0x8B];
    body.extend_from_slice(rest);
    let cut = usize::from(split).min(body.len());

    let mut inflater = GzipInflater::new(64);
    for piece in [&body[..cut], &body[cut..]] {
        for fragment in inflater.feed(piece) {
            match fragment {
                Ok(fragment) => assert!(fragment.len() <= 64),
                Err(_) => return,
            }
        }
    }
    if let Ok(fragments) = inflater.finish() {
        assert!(fragments.iter().all(|f| !f.is_empty() && f.len() <= 64));
    }
});
