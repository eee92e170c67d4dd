#![warn(missing_docs)]
//! Segscan Core
//!
//! Pure scanning logic plus the worker-process runtime:
//! - `Segment` and the array segmenter
//! - single-pass segment scan (max, mean, hidden-key positions)
//! - order-sensitive aggregation under a global reporting cap
//! - `WorkerMain`, the entry point for spawned worker processes

mod aggregate;
mod scan;
mod segment;
mod worker;

pub use aggregate::{Aggregator, Finding, GlobalStats};
pub use scan::scan_segment;
pub use segment::{Segment, segment_bounds};
pub use worker::WorkerMain;

/// Largest array the scanner accepts, matching the request-frame budget.
pub const MAX_ARRAY_SIZE: usize = 1_000_000;
