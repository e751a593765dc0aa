//! Core types for the lap-timing analytics engine.
//!
//! Holds the error types, the lap/session data model, the time-literal codec,
//! display formatting, statistics helpers, the static session/track catalogues
//! and configuration.

pub mod catalog;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;
pub mod time_literal;

pub use error::{FormatError, Result, TimingError};
