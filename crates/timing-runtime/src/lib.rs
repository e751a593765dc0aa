//! Runtime layer for the lap-timing analytics engine.
//!
//! Owns the session store and the analysis-session lifecycle that ties the
//! ingest pipeline, the store and the analysis engines together.

pub mod session;
pub mod store;

pub use timing_core as core;
pub use timing_data as data;
