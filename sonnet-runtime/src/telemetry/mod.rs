//! Sonnet Telemetry - Logging Infrastructure
//!
//! Installs the process-wide `tracing` subscriber. Library crates only emit
//! events; this module decides where they go.

pub mod tracer;

pub use tracer::{build_env_filter, init_tracing, DEFAULT_LOG_FILTER};
