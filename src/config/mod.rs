//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! services.json / backends.json (external loader's output)
//!     → loader.rs (JSON maps)
//!     → validation.rs (topology checks)
//!     → handler / discoverer construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_backends, load_config, load_services, ConfigError};
pub use schema::{ProxyConfig, ServiceConf};
