//! Actors used by the tracker.
//!

mod stats;

pub use stats::*;
