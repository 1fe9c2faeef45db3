//! Results harvesting
//!
//! Saves the appliance results database into the per-test-case output
//! directory and tears down the chassis connection and session.

mod collector;

pub use collector::collect_results;
