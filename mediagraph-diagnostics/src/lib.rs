//! # mediagraph diagnostics
//!
//! Debugging and diagnostic tools for mediagraph.
//! Provides logging setup, negotiation reports for filter graphs and
//! counters for encoder sessions.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod encoder_profiler;
pub mod graph_report;

// Re-export main types
pub use debug_logger::{init_logging, init_logging_from_env, DEFAULT_FILTER};
pub use encoder_profiler::{EncoderProfiler, EncoderStats};
pub use graph_report::{CategoryReport, GraphReport, LinkReport, NodeReport};
