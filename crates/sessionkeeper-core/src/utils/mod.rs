//! Display formatting helpers.

pub mod format;

pub use format::{format_countdown, format_minutes_left, format_timestamp, mask_token, truncate_string};
