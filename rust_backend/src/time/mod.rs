pub mod stamps;

pub use stamps::{add_hours, hours_between, parse_feed_timestamp};
