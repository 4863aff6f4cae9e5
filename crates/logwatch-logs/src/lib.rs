//! Log scanning for logwatch
//!
//! This crate turns raw, timestamped container log output into per-container
//! marker matches: line normalization, filtering, per-container scanning and
//! report aggregation.

mod filter;
mod parser;
mod report;
mod scanner;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use filter::{LineFilter, matches};
pub use parser::{LogParser, NotALogLine};
pub use report::{REPORT_BANNER, ScanAggregator, ScanOptions, render};
pub use scanner::{ScanError, scan_container, scan_text};

// Re-export types used in our public API
pub use logwatch_types::{ContainerRef, ContainerRuntime, LogEntry, MarkerSet, ScanReport};
