use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use logwatch_types::{ContainerRef, ContainerRuntime, MarkerSet, RuntimeError};

use crate::filter::LineFilter;
use crate::parser::LogParser;

/// Why a single container could not be scanned
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("logs of container '{container}' are unavailable: {source}")]
    LogsUnavailable {
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error("fetching logs of container '{container}' timed out after {timeout:?}")]
    TimedOut { container: String, timeout: Duration },
}

impl ScanError {
    /// Name of the container that failed
    pub fn container(&self) -> &str {
        match self {
            Self::LogsUnavailable { container, .. } | Self::TimedOut { container, .. } => {
                container
            }
        }
    }
}

/// Extract the matching messages from raw timestamped log output
///
/// Invalid UTF-8 is replaced rather than rejected. Lines that are not log
/// entries are skipped; everything else goes through the filter and the
/// matched messages come back in log order.
pub fn scan_text(raw: &[u8], window_start: DateTime<Utc>, markers: &MarkerSet) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    let filter = LineFilter::new(window_start, markers);

    text.lines()
        .filter_map(|line| LogParser::normalize(line, window_start).ok())
        .filter(|entry| filter.matches(entry))
        .map(|entry| entry.message.to_string())
        .collect()
}

/// Fetch a container's logs since the window start and return its matches
pub async fn scan_container(
    runtime: &dyn ContainerRuntime,
    container: &ContainerRef,
    window_start: DateTime<Utc>,
    markers: &MarkerSet,
    fetch_timeout: Option<Duration>,
) -> Result<Vec<String>, ScanError> {
    let fetch = runtime.fetch_logs(container, window_start);

    let fetched = match fetch_timeout {
        Some(timeout) => tokio::time::timeout(timeout, fetch).await.map_err(|_| {
            ScanError::TimedOut {
                container: container.name.clone(),
                timeout,
            }
        })?,
        None => fetch.await,
    };

    let raw = fetched.map_err(|source| ScanError::LogsUnavailable {
        container: container.name.clone(),
        source,
    })?;

    let matched = scan_text(&raw, window_start, markers);
    debug!(
        container = %container.name,
        matches = matched.len(),
        "Scanned container logs"
    );

    Ok(matched)
}
