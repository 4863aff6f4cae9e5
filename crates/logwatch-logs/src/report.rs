use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::warn;

use logwatch_types::{ContainerRef, ContainerRuntime, MarkerSet, ScanReport};

use crate::scanner::{ScanError, scan_container};

/// Heading placed above a rendered report
pub const REPORT_BANNER: &str = "❌ Found in container logs:";

/// Marker placed before each container name in a rendered report
const CONTAINER_BULLET: &str = "🔴";

/// Tuning for a scan over many containers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Containers fetched at the same time
    pub max_concurrent: usize,

    /// Per-container fetch timeout (None = wait forever)
    pub fetch_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Runs the scanner over a container set and merges the results
pub struct ScanAggregator<'a> {
    runtime: &'a dyn ContainerRuntime,
    options: ScanOptions,
}

impl<'a> ScanAggregator<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, options: ScanOptions) -> Self {
        Self { runtime, options }
    }

    /// Scan every container and collect the matches
    ///
    /// Up to `max_concurrent` fetches run at once. A container whose logs
    /// cannot be fetched (or whose fetch times out) is logged and left out;
    /// the others are still reported. Containers appear in the order given.
    pub async fn aggregate(
        &self,
        containers: &[ContainerRef],
        window_start: DateTime<Utc>,
        markers: &MarkerSet,
    ) -> ScanReport {
        let concurrency = self.options.max_concurrent.max(1);
        let mut queue = containers.iter().enumerate();
        let mut pending = FuturesUnordered::new();
        let mut slots: Vec<Option<Result<Vec<String>, ScanError>>> =
            containers.iter().map(|_| None).collect();

        for (index, container) in queue.by_ref().take(concurrency) {
            pending.push(self.scan_one(index, container, window_start, markers));
        }

        // Any finished scan frees its slot for the next container
        while let Some((index, result)) = pending.next().await {
            slots[index] = Some(result);
            if let Some((index, container)) = queue.next() {
                pending.push(self.scan_one(index, container, window_start, markers));
            }
        }

        let mut report = ScanReport::new();
        for (container, result) in containers.iter().zip(slots) {
            match result {
                Some(Ok(lines)) => report.insert(container.name.clone(), lines),
                Some(Err(e)) => {
                    warn!(
                        container = %container.name,
                        error = %e,
                        "Skipping container, logs unavailable"
                    );
                }
                None => {}
            }
        }

        report
    }

    async fn scan_one(
        &self,
        index: usize,
        container: &ContainerRef,
        window_start: DateTime<Utc>,
        markers: &MarkerSet,
    ) -> (usize, Result<Vec<String>, ScanError>) {
        let result = scan_container(
            self.runtime,
            container,
            window_start,
            markers,
            self.options.fetch_timeout,
        )
        .await;
        (index, result)
    }
}

/// Render a report for humans: a banner, then each container's name and its
/// matched lines in log order
pub fn render(report: &ScanReport) -> String {
    let mut out = format!("\n{REPORT_BANNER}\n");
    for entry in report.iter() {
        out.push_str(&format!("\n{CONTAINER_BULLET} {}:\n", entry.container));
        out.push_str(&entry.lines.join("\n"));
        out.push('\n');
    }
    out
}
