//! Scenario observer and configuration for logwatch
//!
//! This crate opens a log window when a scenario starts and, when it completes,
//! scans the project's containers and turns the matches into a pass/fail outcome.

pub mod config;
pub mod observer;

pub use config::{Config, ConfigError};
pub use observer::{
    LogsChecker, ScenarioInfo, ScenarioObserver, ScenarioOutcome, WindowError, observe,
};

// Re-export types used in our public API
pub use logwatch_types::{RunWindow, ScanReport};
