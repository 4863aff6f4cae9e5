//! Docker Engine client for logwatch

use std::collections::HashMap;
use std::pin::pin;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{ListContainersOptions, LogOutput, LogsOptions};
use bollard::errors::Error as DockerError;
use bollard::models::ContainerSummary;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use logwatch_types::{ContainerRef, ContainerRuntime, RuntimeError};

/// Docker client wrapper
#[derive(Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the local Docker daemon (socket, named pipe or `DOCKER_HOST`)
    /// and check that it answers
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unreachable(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Unreachable(e.to_string()))?;

        Ok(Self { docker })
    }

    /// Convert a container summary to a ContainerRef
    ///
    /// Docker reports names with a leading slash; the first name wins and the id
    /// stands in when the container has none.
    fn summary_to_ref(summary: ContainerSummary) -> Option<ContainerRef> {
        let id = summary.id?;
        let name = summary
            .names
            .and_then(|names| names.into_iter().next())
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());

        Some(ContainerRef::new(id, name))
    }

    /// Drain a log stream into one buffer
    ///
    /// A stream error discards everything received so far; a partial log is
    /// not scanned.
    async fn collect_logs<S>(stream: S, container_name: &str) -> Result<Vec<u8>, RuntimeError>
    where
        S: Stream<Item = Result<LogOutput, DockerError>>,
    {
        let mut stream = pin!(stream);
        let mut raw = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => raw.extend_from_slice(&output.into_bytes()),
                Err(e) => {
                    warn!(
                        container = %container_name,
                        error = %e,
                        received = raw.len(),
                        "Log stream failed"
                    );
                    return Err(Self::map_error(container_name, e));
                }
            }
        }

        Ok(raw)
    }

    fn map_error(target: &str, error: DockerError) -> RuntimeError {
        match error {
            DockerError::DockerResponseServerError {
                status_code: 404, ..
            } => RuntimeError::NotFound(target.to_string()),
            other => RuntimeError::Request(other.to_string()),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn list_containers(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<ContainerRef>, RuntimeError> {
        let mut filters = HashMap::new();
        if let Some(name) = name_filter.filter(|n| !n.is_empty()) {
            filters.insert("name".to_string(), vec![name.to_string()]);
        }

        let options = ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| Self::map_error("<list>", e))?;

        Ok(summaries
            .into_iter()
            .filter_map(Self::summary_to_ref)
            .collect())
    }

    async fn fetch_logs(
        &self,
        container: &ContainerRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<u8>, RuntimeError> {
        // Docker only takes whole seconds; the scanner re-checks each line
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            since: since.timestamp(),
            timestamps: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let stream = self.docker.logs(&container.id, Some(options));
        let raw = Self::collect_logs(stream, &container.name).await?;

        debug!(
            container = %container.name,
            bytes = raw.len(),
            "Fetched container logs"
        );

        Ok(raw)
    }
}
