#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod reconstruct;
pub mod streaming;

mod fetch;
mod session;

pub use config::DecoderConfig;
pub use dispatch::{CsvParser, RecordParser};
pub use error::{DecodeError, ErrorKind, StreamFailure};
pub use reconstruct::LineReconstructor;
pub use session::SessionStats;
pub use streaming::{DecodeStream, DecoderEvent, StreamingDecoder, decode};
