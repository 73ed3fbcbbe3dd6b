//! Aggregation engine.
//!
//! Turns an entity snapshot and a time range into the stat cards, lists
//! and progress values a dashboard renders.

pub mod aggregator;
pub mod range;

pub use aggregator::*;
pub use range::TimeRange;
