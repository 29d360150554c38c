#![warn(clippy::pedantic)]

pub mod error;
pub mod inflate;
pub mod magic;
pub mod text;

pub use error::WireError;
pub use inflate::{DEFAULT_INFLATE_CHUNK_SIZE, GzipInflater};
pub use magic::{ContentEncoding, GZIP_MAGIC, MagicSniffer};
pub use text::Utf8Decoder;
