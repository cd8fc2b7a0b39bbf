//! ARQ CLI Library
//!
//! Scenario files and report formatting for the `arq-sim` tool.

pub mod config;
pub mod stats;

pub use config::{Config, ScenarioFileError};
pub use stats::{display_compact_result, display_report, format_bytes, format_ticks};
