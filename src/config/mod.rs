//! Settings and configuration module
//!
//! Provides the client configuration with:
//! - Programmatic construction
//! - Environment and JSON loading
//! - Per-endpoint default options

pub mod config;

pub use config::{
    BulkConfig, ConfigError, DEFAULT_BASE_URL, EndpointDefaults, IpqsConfig,
};
