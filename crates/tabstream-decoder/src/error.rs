use tabstream_types::ParseError;
use tabstream_wire::WireError;

/// Errors that end a decoding session.
///
/// ```text
///   DecodeError
///   ├── Fetch(reqwest::Error)   ← request could not be sent / no response   (setup)
///   ├── HttpStatus              ← response status was not 2xx               (setup)
///   ├── UnreadableBody(..)      ← body failed before its first chunk        (setup)
///   ├── Stream(..)              ← body stream failed after it was opened    (processing)
///   ├── Decompress(WireError)   ← malformed or truncated gzip               (processing)
///   ├── Parse(ParseError)       ← from the record parser, unchanged         (processing)
///   └── Cancelled               ← host asked the session to stop
/// ```
///
/// Rows emitted before the error stay valid; nothing is retracted.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("request failed: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("server responded with HTTP {status}")]
    HttpStatus { status: u16 },

    /// The body stream failed before yielding a single chunk.
    #[error("response body could not be read: {0}")]
    UnreadableBody(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The body stream yielded an error mid-read.
    #[error("body stream failed: {0}")]
    Stream(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Decompress(#[from] WireError),

    /// Parser failures are not wrapped: the message is the parser's own.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("decoding cancelled")]
    Cancelled,
}

/// Coarse classification of a [`DecodeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The payload could not be fetched or its body yielded nothing readable.
    Setup,
    /// Reading, inflating or parsing the body failed.
    Processing,
    /// The host stopped the session. Not a pipeline failure.
    Cancelled,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(_) | Self::HttpStatus { .. } | Self::UnreadableBody(_) => ErrorKind::Setup,
            Self::Stream(_) | Self::Decompress(_) | Self::Parse(_) => ErrorKind::Processing,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Terminal failure of a session, tagged with the source it was reading.
///
/// Displays as `Error loading <url> :: <error>`.
#[derive(Debug, thiserror::Error)]
#[error("Error loading {url} :: {error}")]
pub struct StreamFailure {
    pub url: String,
    #[source]
    pub error: DecodeError,
}

impl StreamFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
