//! Docker client for logwatch
//!
//! This crate provides the Docker Engine implementation of
//! [`ContainerRuntime`](logwatch_types::ContainerRuntime).

mod client;

pub use client::DockerClient;

// Re-export types that are used in our public API
pub use logwatch_types::{ContainerRef, ContainerRuntime, RuntimeError};
