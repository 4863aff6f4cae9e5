use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use logwatch_logs::ScanOptions;
use logwatch_types::{IgnoreSet, MarkerSet};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Log checker settings
///
/// Every key is optional in the TOML file:
///
/// ```toml
/// markers = ["ERROR", "CRITICAL"]
/// ignore_prefixes = ["try to"]
/// fail_on_match = true
/// project_name = "shop"
/// fetch_timeout_secs = 30
/// max_concurrent_fetches = 8
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Substrings searched for in log messages, case-insensitively
    pub markers: Vec<String>,

    /// Scenarios whose subject or file name starts with one of these are not checked
    pub ignore_prefixes: Vec<String>,

    /// Fail the scenario when markers are found (otherwise only warn)
    pub fail_on_match: bool,

    /// Only containers whose name contains this are checked (empty = all running)
    pub project_name: String,

    /// Per-container log fetch timeout; 0 waits forever
    pub fetch_timeout_secs: u64,

    /// Containers whose logs are fetched at the same time
    pub max_concurrent_fetches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            markers: vec!["ERROR".to_string()],
            ignore_prefixes: vec!["try to".to_string()],
            fail_on_match: true,
            project_name: String::new(),
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 8,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn marker_set(&self) -> MarkerSet {
        MarkerSet::new(&self.markers)
    }

    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(self.ignore_prefixes.iter().cloned())
    }

    /// Container name filter, if a project is configured
    pub fn project_filter(&self) -> Option<&str> {
        Some(self.project_name.as_str()).filter(|p| !p.is_empty())
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_concurrent: self.max_concurrent_fetches.max(1),
            fetch_timeout: (self.fetch_timeout_secs > 0)
                .then(|| Duration::from_secs(self.fetch_timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml_str(
            r#"
            markers = ["ERROR", "CRITICAL"]
            fail_on_match = false
            project_name = "shop"
            "#,
        )
        .unwrap();

        assert_eq!(config.markers, vec!["ERROR", "CRITICAL"]);
        assert!(!config.fail_on_match);
        assert_eq!(config.project_filter(), Some("shop"));
        assert_eq!(config.ignore_prefixes, vec!["try to"]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::from_toml_str("search_for = [\"ERROR\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_no_project_means_no_filter() {
        assert_eq!(Config::default().project_filter(), None);
    }

    #[test]
    fn test_scan_options() {
        let config = Config {
            fetch_timeout_secs: 0,
            max_concurrent_fetches: 0,
            ..Config::default()
        };
        let options = config.scan_options();
        assert_eq!(options.fetch_timeout, None);
        assert_eq!(options.max_concurrent, 1);

        assert_eq!(
            Config::default().scan_options().fetch_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/logwatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
