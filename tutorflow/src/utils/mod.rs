//! Small helpers shared across modules.

pub mod timestamps;

pub use timestamps::{day_stamp, iso_timestamp, log_timestamp, Timestamp};
