#![no_main]

use libfuzzer_sys::fuzz_target;
use tabstream_wire::Utf8Decoder;

// Fuzz target: Utf8Decoder fed arbitrary bytes in arbitrary pieces.
//
// Input format:
//   byte 0: piece length (0 treated as 1)
//   bytes 1..: text bytes, not necessarily valid UTF-8
//
// The joined output must equal a one-shot lossy decode of the whole
// input with any leading BOM removed.
fuzz_target!(|data: &[u8]| {
    let Some((&step, bytes)) = data.split_first() else {
        return;
    };
    let step = usize::from(step.max(1));

    let mut decoder = Utf8Decoder::new();
    let mut out = String::new();
    for piece in bytes.chunks(step) {
        out.push_str(&decoder.decode(piece));
    }
    out.push_str(&decoder.finish());

    let whole = String::from_utf8_lossy(bytes);
    let expected = whole.strip_prefix('\u{feff}').unwrap_or(&whole);
    assert_eq!(out, expected);
});
