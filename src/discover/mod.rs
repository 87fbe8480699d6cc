//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! LoadBalancer refresh tick
//!     → ServiceDiscoverer::discover()
//!         - StaticDiscoverer (fixed list)
//!         - FileDiscoverer   (one URL per line)
//!         - JsonDiscoverer   (service name → [URL] map)
//!     → Vec<Endpoint> replaces the balancer cache
//! ```
//!
//! # Design Decisions
//! - An empty result is an error: a pool never becomes
//!   empty-but-operational
//! - Unparsable lines/entries are skipped with a warning; only a fully
//!   empty outcome fails the refresh

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::load_balancer::Endpoint;

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("discovery I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed discovery input: {0}")]
    Malformed(String),
    #[error("no endpoints available for service '{0}'")]
    Empty(String),
}

/// Produces the current list of backend endpoints for one service.
#[async_trait]
pub trait ServiceDiscoverer: Send + Sync {
    async fn discover(&self) -> Result<Vec<Endpoint>, DiscoverError>;
}

/// The simplest discoverer: a predefined endpoint list.
pub struct StaticDiscoverer {
    endpoints: Vec<Endpoint>,
    name: String,
}

impl StaticDiscoverer {
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            name: name.into(),
        }
    }
}

#[async_trait]
impl ServiceDiscoverer for StaticDiscoverer {
    async fn discover(&self) -> Result<Vec<Endpoint>, DiscoverError> {
        if self.endpoints.is_empty() {
            return Err(DiscoverError::Empty(self.name.clone()));
        }
        Ok(self.endpoints.clone())
    }
}

/// Reads endpoints from a file, one URL per line.
pub struct FileDiscoverer {
    pub path: PathBuf,
}

#[async_trait]
impl ServiceDiscoverer for FileDiscoverer {
    async fn discover(&self) -> Result<Vec<Endpoint>, DiscoverError> {
        let content = tokio::fs::read_to_string(&self.path).await?;

        let mut endpoints = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<Endpoint>() {
                Ok(ep) => endpoints.push(ep),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), line, error = %e, "skipping endpoint line");
                }
            }
        }

        if endpoints.is_empty() {
            return Err(DiscoverError::Empty(self.path.display().to_string()));
        }
        Ok(endpoints)
    }
}

/// Reads one service's endpoints out of a JSON map of
/// service name → list of URLs.
pub struct JsonDiscoverer {
    pub path: PathBuf,
    pub name: String,
}

#[async_trait]
impl ServiceDiscoverer for JsonDiscoverer {
    async fn discover(&self) -> Result<Vec<Endpoint>, DiscoverError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let backends: HashMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| DiscoverError::Malformed(e.to_string()))?;

        let mut endpoints = Vec::new();
        for raw in backends.get(&self.name).map(Vec::as_slice).unwrap_or(&[]) {
            match raw.parse::<Endpoint>() {
                Ok(ep) => endpoints.push(ep),
                Err(e) => {
                    tracing::warn!(service = %self.name, url = %raw, error = %e, "skipping endpoint url");
                }
            }
        }

        if endpoints.is_empty() {
            return Err(DiscoverError::Empty(self.name.clone()));
        }
        Ok(endpoints)
    }
}
