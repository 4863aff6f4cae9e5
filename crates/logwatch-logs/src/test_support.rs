//! In-memory container runtime for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use logwatch_types::{ContainerRef, ContainerRuntime, RuntimeError};

/// Serves canned log output per container id
#[derive(Default)]
pub struct FakeRuntime {
    containers: Vec<ContainerRef>,
    logs: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    list_fails: bool,
    fetches: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container whose id and name are both `name`
    pub fn with_logs(mut self, name: &str, lines: &[&str]) -> Self {
        self.containers.push(ContainerRef::new(name, name));
        self.logs.insert(name.to_string(), lines.join("\n").into_bytes());
        self
    }

    /// Add a container whose log fetch fails
    pub fn with_failure(mut self, name: &str) -> Self {
        self.containers.push(ContainerRef::new(name, name));
        self.failing.insert(name.to_string());
        self
    }

    /// Add a container whose log fetch takes `delay`
    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.containers.push(ContainerRef::new(name, name));
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Delay the log fetch of an already added container
    pub fn with_delay_for(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Make container listing fail
    pub fn with_list_failure(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn containers(&self) -> Vec<ContainerRef> {
        self.containers.clone()
    }

    /// Number of log fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<ContainerRef>, RuntimeError> {
        if self.list_fails {
            return Err(RuntimeError::Unreachable("fake runtime is down".to_string()));
        }

        Ok(self
            .containers
            .iter()
            .filter(|c| name_filter.is_none_or(|f| c.name.contains(f)))
            .cloned()
            .collect())
    }

    async fn fetch_logs(
        &self,
        container: &ContainerRef,
        _since: DateTime<Utc>,
    ) -> Result<Vec<u8>, RuntimeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&container.id) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&container.id) {
            return Err(RuntimeError::NotFound(container.name.clone()));
        }

        Ok(self.logs.get(&container.id).cloned().unwrap_or_default())
    }
}
