/// Errors raised while turning raw body bytes into text.
///
/// ```text
///   WireError
///   ├── Inflate(io::Error)        ← corrupt gzip header or deflate data
///   └── UnexpectedEnd(io::Error)  ← body closed mid-member, or bad CRC/ISIZE
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The inflate engine rejected the compressed bytes.
    ///
    /// The session stops here; no attempt is made to resynchronise on a
    /// later deflate block.
    #[error("gzip inflate failed: {0}")]
    Inflate(#[source] std::io::Error),

    /// The byte stream closed but the gzip member could not be finalized:
    /// either it was truncated before its 8-byte CRC32/ISIZE trailer or
    /// the trailer does not match the inflated data.
    #[error("gzip stream did not end cleanly: {0}")]
    UnexpectedEnd(#[source] std::io::Error),
}
