//! Prowl Core - Foundation crate for the Prowl product-page crawler.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Prowl crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes and enums (`Domain`, `CrawlStatus`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use prowl_core::{AppConfig, Domain};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let domain = Domain::parse("amazon.in")?;
//! assert_eq!(domain.entry_url(), "https://www.amazon.in/");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, BrowserKind, CrawlConfig, OutputConfig, RulesConfig};
pub use error::{ConfigError, ConfigResult, ProwlError, Result};
pub use types::{CrawlStatus, Domain, Timestamp};
