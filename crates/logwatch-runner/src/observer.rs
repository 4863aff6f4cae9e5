use std::future::Future;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use logwatch_logs::{ScanAggregator, ScanOptions, render};
use logwatch_types::{
    ContainerRef, ContainerRuntime, IgnoreSet, MarkerSet, RunWindow, RuntimeError, ScanReport,
};

use crate::config::Config;

/// Identity of a test scenario as seen by the runner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioInfo {
    /// Human-readable scenario subject
    pub subject: String,

    /// File the scenario is defined in, if known
    pub path: Option<PathBuf>,
}

impl ScenarioInfo {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// File name of the scenario path
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }
}

/// Result of checking a scenario's container logs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScenarioOutcome {
    /// No window was opened or there was nothing to scan
    Skipped,

    /// Containers were scanned and no marker was found
    Clean,

    /// Markers were found but the policy only warns
    Warned(ScanReport),

    /// Markers were found and the scenario must fail
    Failed(ScanReport),
}

impl ScenarioOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            Self::Warned(report) | Self::Failed(report) => Some(report),
            Self::Skipped | Self::Clean => None,
        }
    }

    /// Message to attach to the failed scenario
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Failed(report) => Some(render(report)),
            _ => None,
        }
    }
}

/// Could not determine which containers to watch
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("could not list containers: {0}")]
    ContainerListUnavailable(#[source] RuntimeError),
}

/// Hooks a test runner calls around each scenario
///
/// The window returned by [`on_start`](Self::on_start) belongs to that scenario
/// run and has to be handed back to [`on_complete`](Self::on_complete).
#[async_trait]
pub trait ScenarioObserver: Send + Sync {
    /// Open the scan window, or return None when the scenario is not checked
    async fn on_start(&self, scenario: &ScenarioInfo) -> Option<RunWindow>;

    /// Scan the window and decide the outcome
    async fn on_complete(
        &self,
        scenario: &ScenarioInfo,
        window: Option<RunWindow>,
    ) -> ScenarioOutcome;
}

/// Run `body` as a scenario between the observer's start and completion hooks
pub async fn observe<F, T>(
    observer: &dyn ScenarioObserver,
    scenario: &ScenarioInfo,
    body: F,
) -> (T, ScenarioOutcome)
where
    F: Future<Output = T>,
{
    let window = observer.on_start(scenario).await;
    let value = body.await;
    let outcome = observer.on_complete(scenario, window).await;
    (value, outcome)
}

/// Scans project container logs for markers around each scenario
pub struct LogsChecker<R> {
    runtime: R,
    markers: MarkerSet,
    ignore: IgnoreSet,
    fail_on_match: bool,
    project_name: Option<String>,
    options: ScanOptions,
}

impl<R: ContainerRuntime> LogsChecker<R> {
    pub fn new(runtime: R, config: &Config) -> Self {
        Self {
            runtime,
            markers: config.marker_set(),
            ignore: config.ignore_set(),
            fail_on_match: config.fail_on_match,
            project_name: config.project_filter().map(str::to_string),
            options: config.scan_options(),
        }
    }

    /// The ignore prefix matching the scenario subject or file name
    fn ignored_by(&self, scenario: &ScenarioInfo) -> Option<&str> {
        self.ignore
            .matching_prefix(&scenario.subject)
            .or_else(|| scenario.file_name().and_then(|f| self.ignore.matching_prefix(f)))
    }

    async fn resolve_containers(&self) -> Result<Vec<ContainerRef>, WindowError> {
        self.runtime
            .list_containers(self.project_name.as_deref())
            .await
            .map_err(WindowError::ContainerListUnavailable)
    }
}

#[async_trait]
impl<R: ContainerRuntime> ScenarioObserver for LogsChecker<R> {
    async fn on_start(&self, scenario: &ScenarioInfo) -> Option<RunWindow> {
        if let Some(prefix) = self.ignored_by(scenario) {
            info!(
                scenario = %scenario.subject,
                prefix,
                "Scenario has an ignored prefix, logs will not be checked"
            );
            return None;
        }

        let start = Utc::now();
        info!(scenario = %scenario.subject, %start, "Scenario started, log window opened");

        let containers = match self.resolve_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(
                    scenario = %scenario.subject,
                    error = %e,
                    "Container list unavailable, logs will not be checked"
                );
                Vec::new()
            }
        };

        let window = RunWindow::new(start, containers);
        info!(containers = ?window.container_names(), "Found containers");
        Some(window)
    }

    async fn on_complete(
        &self,
        scenario: &ScenarioInfo,
        window: Option<RunWindow>,
    ) -> ScenarioOutcome {
        let Some(window) = window else {
            return ScenarioOutcome::Skipped;
        };
        if window.is_empty() {
            debug!(scenario = %scenario.subject, "No containers in window, nothing to check");
            return ScenarioOutcome::Skipped;
        }

        info!(scenario = %scenario.subject, since = %window.start, "Checking container logs");
        let report = ScanAggregator::new(&self.runtime, self.options)
            .aggregate(&window.containers, window.start, &self.markers)
            .await;

        if report.is_empty() {
            info!(scenario = %scenario.subject, "No markers found in project containers");
            return ScenarioOutcome::Clean;
        }

        if self.fail_on_match {
            // The runner prints the rendered report with the failure
            error!(
                scenario = %scenario.subject,
                containers = report.len(),
                matches = report.total_matches(),
                "Markers found in container logs, failing scenario"
            );
            ScenarioOutcome::Failed(report)
        } else {
            warn!(scenario = %scenario.subject, "{}", render(&report));
            ScenarioOutcome::Warned(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwatch_logs::test_support::FakeRuntime;

    fn config() -> Config {
        Config {
            fetch_timeout_secs: 5,
            ..Config::default()
        }
    }

    fn erroring_runtime() -> FakeRuntime {
        // Dated far in the future so the lines are inside any window opened now
        FakeRuntime::new()
            .with_logs("shop-api", &["2999-01-01T00:00:00Z ERROR payment failed"])
            .with_logs("shop-db", &["2999-01-01T00:00:00Z INFO ready"])
    }

    #[tokio::test]
    async fn test_matches_fail_scenario() {
        let checker = LogsChecker::new(erroring_runtime(), &config());
        let scenario = ScenarioInfo::new("register user");

        let window = checker.on_start(&scenario).await;
        assert_eq!(window.as_ref().map(|w| w.containers.len()), Some(2));

        let outcome = checker.on_complete(&scenario, window).await;
        assert!(outcome.is_failure());
        let report = outcome.report().unwrap();
        assert_eq!(report.get("shop-api"), Some(&["ERROR payment failed".to_string()][..]));
        assert!(report.get("shop-db").is_none());

        let message = outcome.failure_message().unwrap();
        assert!(message.contains("shop-api"));
        assert!(message.contains("ERROR payment failed"));
    }

    #[tokio::test]
    async fn test_failure_message_holds_report_once() {
        let checker = LogsChecker::new(erroring_runtime(), &config());
        let scenario = ScenarioInfo::new("register user");

        let window = checker.on_start(&scenario).await;
        let outcome = checker.on_complete(&scenario, window).await;
        let message = outcome.failure_message().unwrap();
        assert_eq!(message.matches(logwatch_logs::REPORT_BANNER).count(), 1);
        assert_eq!(message.matches("ERROR payment failed").count(), 1);
    }

    #[tokio::test]
    async fn test_warn_only_policy() {
        let config = Config {
            fail_on_match: false,
            ..config()
        };
        let checker = LogsChecker::new(erroring_runtime(), &config);
        let scenario = ScenarioInfo::new("register user");

        let window = checker.on_start(&scenario).await;
        let outcome = checker.on_complete(&scenario, window).await;
        assert!(matches!(outcome, ScenarioOutcome::Warned(_)));
        assert!(!outcome.is_failure());
        assert!(outcome.failure_message().is_none());
    }

    #[tokio::test]
    async fn test_clean_logs() {
        let runtime = FakeRuntime::new().with_logs("shop-api", &["2999-01-01T00:00:00Z INFO ok"]);
        let checker = LogsChecker::new(runtime, &config());
        let scenario = ScenarioInfo::new("register user");

        let window = checker.on_start(&scenario).await;
        assert_eq!(checker.on_complete(&scenario, window).await, ScenarioOutcome::Clean);
    }

    #[tokio::test]
    async fn test_ignored_subject_never_opens_window() {
        let checker = LogsChecker::new(erroring_runtime(), &config());
        let scenario = ScenarioInfo::new("try to reset state");

        let window = checker.on_start(&scenario).await;
        assert!(window.is_none());
        assert_eq!(checker.on_complete(&scenario, window).await, ScenarioOutcome::Skipped);
        assert_eq!(checker.runtime.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_ignored_file_name() {
        let config = Config {
            ignore_prefixes: vec!["try_to_".to_string()],
            ..config()
        };
        let checker = LogsChecker::new(erroring_runtime(), &config);
        let scenario = ScenarioInfo::new("reset state").with_path("scenarios/try_to_reset.py");

        assert!(checker.on_start(&scenario).await.is_none());
    }

    #[tokio::test]
    async fn test_project_filter_limits_containers() {
        let runtime = erroring_runtime().with_logs("other-api", &["2999-01-01T00:00:00Z ERROR"]);
        let config = Config {
            project_name: "shop".to_string(),
            ..config()
        };
        let checker = LogsChecker::new(runtime, &config);

        let window = checker.on_start(&ScenarioInfo::new("s")).await.unwrap();
        assert_eq!(window.container_names(), vec!["shop-api", "shop-db"]);
    }

    #[tokio::test]
    async fn test_list_failure_degrades_to_noop() {
        let checker = LogsChecker::new(erroring_runtime().with_list_failure(), &config());
        let scenario = ScenarioInfo::new("register user");

        let window = checker.on_start(&scenario).await;
        assert!(window.as_ref().is_some_and(RunWindow::is_empty));
        assert_eq!(checker.on_complete(&scenario, window).await, ScenarioOutcome::Skipped);
        assert_eq!(checker.runtime.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_hide_other_matches() {
        let runtime = erroring_runtime().with_failure("shop-worker");
        let checker = LogsChecker::new(runtime, &config());
        let scenario = ScenarioInfo::new("checkout");

        let window = checker.on_start(&scenario).await;
        let outcome = checker.on_complete(&scenario, window).await;
        let report = outcome.report().unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.get("shop-api").is_some());
    }

    #[tokio::test]
    async fn test_observe_runs_body_between_hooks() {
        let checker = LogsChecker::new(erroring_runtime(), &config());
        let scenario = ScenarioInfo::new("checkout");

        let (value, outcome) = observe(&checker, &scenario, async { 42 }).await;
        assert_eq!(value, 42);
        assert!(outcome.is_failure());
    }
}
