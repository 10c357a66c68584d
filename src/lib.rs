//! TraceCraft library
//!
//! Exposes the CLI, configuration and replay modules for integration testing

pub mod cli;
pub mod config;
pub mod replay;

// Re-export commonly used types for external use
pub use config::{Config, RetryConfig};
pub use replay::{ReplayReport, ReplayedStep, TraceReplayer};
