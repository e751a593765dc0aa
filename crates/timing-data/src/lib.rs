//! Data layer for the lap-timing analytics engine.
//!
//! Reads CSV exports, segments them into per-driver blocks, normalises the
//! laps into sessions and computes rankings, reference deltas and
//! cross-session evolution.

pub mod aggregator;
pub mod analysis;
pub mod parser;
pub mod reader;
pub mod reference;

pub use timing_core as core;
