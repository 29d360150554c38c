#![warn(clippy::pedantic)]

pub mod error;
pub mod options;
pub mod row;

pub use error::ParseError;
pub use options::{ParseOptions, SkipEmptyLines};
pub use row::{Cell, PARSED_EXTRA_KEY, Row, RowSet, type_cell};
