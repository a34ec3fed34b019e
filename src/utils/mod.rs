//! Utility functions.
//!
//! Helpers used while loading configuration.

pub mod parser;

pub use parser::{format_duration, parse_bool, parse_duration};
