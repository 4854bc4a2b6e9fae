pub mod error;
pub mod value;

pub use error::{DbError, Result};
pub use value::{format_timestamp, parse_timestamp, timestamp_value};
