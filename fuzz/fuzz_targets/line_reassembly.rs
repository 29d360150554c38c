#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabstream_decoder::LineReconstructor;

#[derive(Debug, Arbitrary)]
struct Input {
    fragments: Vec<String>,
    header_mode: bool,
}

// Fuzz target: LineReconstructor over arbitrary fragments.
//
// Checks, for every fragment sequence:
// - every block ends on '\n'
// - in header mode every block starts with the cached header
// - without header mode, blocks plus the final carry rebuild the input
fuzz_target!(|input: Input| {
    let mut lines = LineReconstructor::new(input.header_mode);
    let mut rebuilt = String::new();

    for fragment in &input.fragments {
        if let Some(block) = lines.reconstruct(fragment) {
            assert!(block.ends_with('\n'));
            if let Some(header) = lines.header() {
                assert!(block.starts_with(header));
            }
            rebuilt.push_str(&block);
        }
    }

    if !input.header_mode {
        rebuilt.push_str(lines.carry());
        assert_eq!(rebuilt, input.fragments.concat());
    }
});
