//! Session and server counters

pub mod metrics;

pub use metrics::{ServerStats, SessionStats};
