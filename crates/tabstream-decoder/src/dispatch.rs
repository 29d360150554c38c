use std::sync::Arc;

use serde_json::{Map, Value};
use tabstream_types::{PARSED_EXTRA_KEY, ParseError, ParseOptions, Row, RowSet, SkipEmptyLines, type_cell};

use crate::error::DecodeError;

/// A delimited-text parsing capability.
///
/// The decoder guarantees that `block` ends on a line boundary and, when
/// `options.header` is set, starts with the header line. Implementations
/// only turn that text into rows.
///
/// Closures with the matching signature implement this trait, which is
/// handy for wrapping another parser or recording blocks in tests.
pub trait RecordParser: Send + Sync {
    /// # Errors
    ///
    /// Any [`ParseError`]; the decoder forwards it unchanged.
    fn parse(&self, block: &str, options: &ParseOptions) -> Result<RowSet, ParseError>;
}

impl<F> RecordParser for F
where
    F: Fn(&str, &ParseOptions) -> Result<RowSet, ParseError> + Send + Sync,
{
    fn parse(&self, block: &str, options: &ParseOptions) -> Result<RowSet, ParseError> {
        self(block, options)
    }
}

/// Default parser capability, backed by the `csv` crate.
///
/// Rows are flexible: short records yield fewer cells, and in header mode
/// fields past the header width are gathered under `__parsed_extra`.
///
/// ```text
/// ┌──────────────┬──────────────────────────────────────────────────┐
/// │ Option       │ Effect                                           │
/// ├──────────────┼──────────────────────────────────────────────────┤
/// │ header       │ first record names columns → Row::Record         │
/// │ delimiter    │ field separator, ASCII only (default ',')        │
/// │ quote_char   │ quoting character, ASCII only (default '"')      │
/// │ escape_char  │ backslash-style escape; same as quote = doubling │
/// │ comments     │ lines starting with this byte are skipped        │
/// │ skipEmpty…   │ Off: blank line → [""], On: drop [""] records,   │
/// │              │ Greedy: also drop whitespace-only records        │
/// │ dynamicTyping│ see `tabstream_types::type_cell`                 │
/// └──────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvParser;

impl RecordParser for CsvParser {
    fn parse(&self, block: &str, options: &ParseOptions) -> Result<RowSet, ParseError> {
        let syntax = Syntax::from_options(options)?;
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(syntax.delimiter)
            .quote(syntax.quote)
            .comment(syntax.comment);
        if let Some(escape) = syntax.escape {
            builder.escape(Some(escape)).double_quote(false);
        }

        // The csv reader never yields blank lines; keep them as one-empty-field
        // records when blank lines are not to be skipped.
        let blanks = if options.skip_empty_lines == SkipEmptyLines::Off {
            blank_lines(block.as_bytes(), &syntax)
        } else {
            Vec::new()
        };
        let mut blanks = blanks.into_iter().peekable();
        let blank_record = || csv::StringRecord::from(vec![""]);

        let mut reader = builder.from_reader(block.as_bytes());
        let mut records = reader.records();

        let header: Option<Vec<String>> = if options.header {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(malformed)?;
                    let start = record_start(&record);
                    while blanks.next_if(|&at| at < start).is_some() {}
                    Some(record.iter().map(str::to_owned).collect())
                }
                None => return Ok(RowSet::default()),
            }
        } else {
            None
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(malformed)?;
            let start = record_start(&record);
            while blanks.next_if(|&at| at < start).is_some() {
                rows.extend(to_row(&blank_record(), header.as_deref(), options));
            }
            rows.extend(to_row(&record, header.as_deref(), options));
        }
        for _ in blanks {
            rows.extend(to_row(&blank_record(), header.as_deref(), options));
        }

        Ok(RowSet::new(rows))
    }
}

/// Single-byte syntax characters resolved from [`ParseOptions`].
struct Syntax {
    delimiter: u8,
    quote: u8,
    /// `None` when escaping is quote doubling.
    escape: Option<u8>,
    comment: Option<u8>,
}

impl Syntax {
    fn from_options(options: &ParseOptions) -> Result<Self, ParseError> {
        let delimiter = ascii_option("delimiter", options.delimiter.unwrap_or(','))?;
        let quote = ascii_option("quoteChar", options.quote_char.unwrap_or('"'))?;
        let escape = options
            .escape_char
            .map(|escape| ascii_option("escapeChar", escape))
            .transpose()?
            .filter(|&escape| escape != quote);
        let comment = options
            .comments
            .map(|prefix| ascii_option("comments", prefix))
            .transpose()?;
        Ok(Self {
            delimiter,
            quote,
            escape,
            comment,
        })
    }
}

/// Byte offsets of the blank lines in `block` (empty, or a lone `\r`),
/// ignoring line breaks inside quoted fields and comment lines.
fn blank_lines(block: &[u8], syntax: &Syntax) -> Vec<u64> {
    let mut blanks = Vec::new();
    let mut in_quotes = false;
    let mut line_start = 0;
    let mut i = 0;

    while i < block.len() {
        let byte = block[i];
        if in_quotes {
            if Some(byte) == syntax.escape {
                i += 2;
                continue;
            }
            if byte == syntax.quote {
                in_quotes = false;
            }
        } else if i == line_start && Some(byte) == syntax.comment {
            let Some(end) = block[i..].iter().position(|&b| b == b'\n') else {
                break;
            };
            i += end + 1;
            line_start = i;
            continue;
        } else if byte == syntax.quote && (i == line_start || block[i - 1] == syntax.delimiter) {
            in_quotes = true;
        } else if byte == b'\n' {
            if matches!(&block[line_start..i], b"" | b"\r") {
                blanks.push(line_start as u64);
            }
            line_start = i + 1;
        }
        i += 1;
    }
    blanks
}

fn record_start(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::byte)
}

fn to_row(record: &csv::StringRecord, header: Option<&[String]>, options: &ParseOptions) -> Option<Row> {
    if is_skipped(record, options.skip_empty_lines) {
        return None;
    }
    Some(match header {
        Some(names) => Row::Record(keyed_row(names, record, options.dynamic_typing)),
        None => Row::Fields(
            record
                .iter()
                .map(|field| type_cell(field, options.dynamic_typing))
                .collect(),
        ),
    })
}

fn keyed_row(names: &[String], record: &csv::StringRecord, dynamic: bool) -> Map<String, Value> {
    let mut map = Map::with_capacity(names.len());
    let mut extra = Vec::new();
    for (index, field) in record.iter().enumerate() {
        let cell = type_cell(field, dynamic);
        match names.get(index) {
            Some(name) => {
                map.insert(name.clone(), cell);
            }
            None => extra.push(cell),
        }
    }
    if !extra.is_empty() {
        map.insert(PARSED_EXTRA_KEY.to_owned(), Value::Array(extra));
    }
    map
}

fn is_skipped(record: &csv::StringRecord, mode: SkipEmptyLines) -> bool {
    match mode {
        SkipEmptyLines::Off => false,
        SkipEmptyLines::On => record.len() == 1 && record[0].is_empty(),
        SkipEmptyLines::Greedy => record.iter().all(|field| field.trim().is_empty()),
    }
}

fn ascii_option(option: &'static str, value: char) -> Result<u8, ParseError> {
    u8::try_from(value)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ParseError::InvalidOption {
            option,
            reason: format!("{value:?} is not a single ASCII character"),
        })
}

fn malformed(error: csv::Error) -> ParseError {
    ParseError::Malformed {
        line: error.position().map_or(0, csv::Position::line),
        message: error.to_string(),
    }
}

/// Binds a parser to the session's options.
#[derive(Clone)]
pub(crate) struct Dispatch {
    parser: Arc<dyn RecordParser>,
    options: ParseOptions,
}

impl Dispatch {
    pub(crate) fn new(parser: Arc<dyn RecordParser>, options: ParseOptions) -> Self {
        Self { parser, options }
    }

    pub(crate) fn header_mode(&self) -> bool {
        self.options.header
    }

    pub(crate) fn parse(&self, block: &str) -> Result<RowSet, DecodeError> {
        Ok(self.parser.parse(block, &self.options)?)
    }
}
