/// Errors raised by a record parser capability.
///
/// The decoder forwards these verbatim: by the time a block reaches the
/// parser it already ends on a line boundary, so anything reported here
/// is about the records themselves or the options, never about chunking.
///
/// ```text
/// ┌─────────────────┬─────────────────────────────────────────────────┐
/// │ Variant         │ Cause                                           │
/// ├─────────────────┼─────────────────────────────────────────────────┤
/// │ InvalidOption   │ Option value the parser cannot honour           │
/// │ Malformed       │ Record text the parser could not read           │
/// │ Custom          │ Failure reported by a host-supplied parser      │
/// └─────────────────┴─────────────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid parse option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    /// `line` is 1-based within the block handed to the parser.
    #[error("malformed record at block line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("{0}")]
    Custom(String),
}
