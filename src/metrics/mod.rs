//! Prometheus metrics for the vacuum.
//!
//! This module owns the gauge catalog and the loop that keeps it filled with
//! the latest values read from the device.

pub mod catalog;
pub mod poller;

// Re-export commonly used items
pub use catalog::{MetricDefinition, RoborockMetrics, DEFINITIONS};
pub use poller::Poller;
