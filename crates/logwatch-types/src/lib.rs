//! Shared types for logwatch
//!
//! This crate contains the data model used across the logwatch crates and the
//! [`ContainerRuntime`] seam that the scanner talks to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Container Types
// ============================================================================

/// Handle to a container as reported by the runtime
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    /// Runtime identifier (used to fetch logs)
    pub id: String,

    /// Display name (used as the report key)
    pub name: String,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The scan window of a single scenario execution
#[derive(Clone, Debug)]
pub struct RunWindow {
    /// Instant the scenario started; also the fallback instant for malformed lines
    pub start: DateTime<Utc>,

    /// Containers in scope, in the order the runtime listed them
    pub containers: Vec<ContainerRef>,
}

impl RunWindow {
    pub fn new(start: DateTime<Utc>, containers: Vec<ContainerRef>) -> Self {
        Self { start, containers }
    }

    /// Names of the containers in scope
    pub fn container_names(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.name.as_str()).collect()
    }

    /// A window with nothing to scan
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// A log line split into its instant and message body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogEntry<'a> {
    pub instant: DateTime<Utc>,
    pub message: &'a str,
}

impl<'a> LogEntry<'a> {
    pub fn new(instant: DateTime<Utc>, message: &'a str) -> Self {
        Self { instant, message }
    }
}

/// Case-insensitive substrings that mark a log message as a match
///
/// Markers are stored lower-cased. Blank markers are dropped since they would
/// match every line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkerSet {
    markers: Vec<String>,
}

impl MarkerSet {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .filter(|m| !m.as_ref().trim().is_empty())
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Lower-cased markers in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Scenario identifier prefixes that exempt a scenario from scanning
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    prefixes: Vec<String>,
}

impl IgnoreSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Returns the first prefix the identifier starts with, if any
    pub fn matching_prefix(&self, identifier: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| identifier.starts_with(p.as_str()))
            .map(String::as_str)
    }

    pub fn is_ignored(&self, identifier: &str) -> bool {
        self.matching_prefix(identifier).is_some()
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// Matched messages of one container, in log order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerMatches {
    pub container: String,
    pub lines: Vec<String>,
}

/// Matches of a whole scan, keyed by container name
///
/// Containers keep the order in which they were inserted. A container is only
/// present when it has at least one matched line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    containers: Vec<ContainerMatches>,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the matches of a container; empty match lists are ignored and a
    /// repeated name appends to the existing entry
    pub fn insert(&mut self, container: impl Into<String>, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }

        let container = container.into();
        match self.containers.iter_mut().find(|c| c.container == container) {
            Some(existing) => existing.lines.extend(lines),
            None => self.containers.push(ContainerMatches { container, lines }),
        }
    }

    /// Matched lines for a container
    pub fn get(&self, container: &str) -> Option<&[String]> {
        self.containers
            .iter()
            .find(|c| c.container == container)
            .map(|c| c.lines.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerMatches> {
        self.containers.iter()
    }

    /// Number of containers with matches
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Total matched lines across all containers
    pub fn total_matches(&self) -> usize {
        self.containers.iter().map(|c| c.lines.len()).sum()
    }
}

// ============================================================================
// Container Runtime
// ============================================================================

/// Failures reported by a container runtime client
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container runtime is unreachable: {0}")]
    Unreachable(String),

    #[error("container '{0}' not found")]
    NotFound(String),

    #[error("container runtime request failed: {0}")]
    Request(String),
}

/// The operations logwatch needs from a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List running containers, optionally restricted to names containing `name_filter`
    async fn list_containers(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<ContainerRef>, RuntimeError>;

    /// Fetch the raw log output of a container emitted since `since`, each line
    /// prefixed with its runtime timestamp
    async fn fetch_logs(
        &self,
        container: &ContainerRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<u8>, RuntimeError>;
}
