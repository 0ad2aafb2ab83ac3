//!
//! Utility module for the oracle.
//!
//! Re-exports formatting helpers used in log lines and query output.
/// Utility functions for formatting and display
pub mod index;

pub use index::{format_root_prefix, format_unix_timestamp};
