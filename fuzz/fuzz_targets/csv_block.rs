#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tabstream_decoder::{CsvParser, RecordParser};
use tabstream_types::{ParseOptions, SkipEmptyLines};

#[derive(Debug, Arbitrary)]
struct Input {
    block: String,
    header: bool,
    dynamic_typing: bool,
    greedy: bool,
    delimiter: Option<char>,
}

// Fuzz target: CsvParser on arbitrary blocks and options.
//
// Catches bugs in:
// - Header handling on empty or header-only blocks
// - Extra-field collection past the header width
// - Dynamic typing of arbitrary field text
// - Rejection of non-ASCII option characters
fuzz_target!(|input: Input| {
    let mut options = ParseOptions::new()
        .with_header(input.header)
        .with_dynamic_typing(input.dynamic_typing);
    if input.greedy {
        options = options.with_skip_empty_lines(SkipEmptyLines::Greedy);
    }
    if let Some(delimiter) = input.delimiter {
        options = options.with_delimiter(delimiter);
    }

    if let Ok(rows) = CsvParser.parse(&input.block, &options) {
        for row in &rows {
            assert!(!input.header || matches!(row, tabstream_types::Row::Record(_)));
        }
    }
});
