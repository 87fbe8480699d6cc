//! Backend endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single `(scheme, host, base path)` target
//! - Parse endpoints from configured URLs

use std::fmt;
use std::str::FromStr;

use crate::discover::DiscoverError;

/// A concrete backend target the proxy may forward to.
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `http` or `https`.
    pub scheme: String,
    /// Host with optional port, e.g. `10.0.0.1:8000`.
    pub authority: String,
    /// Base path prefix the backend expects. Empty for the root.
    pub base_path: String,
}

impl Endpoint {
    /// The path to put on upstream requests. Always non-empty.
    pub fn upstream_path(&self) -> &str {
        if self.base_path.is_empty() {
            "/"
        } else {
            &self.base_path
        }
    }
}

impl FromStr for Endpoint {
    type Err = DiscoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s).map_err(|e| DiscoverError::Malformed(e.to_string()))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(DiscoverError::Malformed(format!(
                "unsupported scheme '{scheme}' in endpoint url '{s}'"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| DiscoverError::Malformed(format!("endpoint url '{s}' has no host")))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let base_path = match url.path() {
            "/" => String::new(),
            p => p.trim_end_matches('/').to_string(),
        };

        Ok(Self {
            scheme,
            authority,
            base_path,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority, self.base_path)
    }
}
