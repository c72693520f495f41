//! Prowl Crawler - product-page discovery across e-commerce domains.
//!
//! Each configured domain is crawled by its own [`DomainOrchestrator`],
//! which pulls URLs from a bounded [`FrontierManager`], fetches them through
//! the [`AccessGate`] (retries, CAPTCHA gating, fast-path product URLs),
//! renders lazy content with the [`DynamicContentController`] and scores the
//! result with the [`PageClassifier`]. Product URLs land in the domain's
//! shard of the [`ResultStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use prowl_crawler::CrawlEngine;
//! use prowl_rules::Rulebook;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = CrawlEngine::new(config, Arc::new(Rulebook::builtin()?));
//! let reports = engine.run(&CancellationToken::new()).await;
//! engine.store().export(&config.output.results_path)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod classifier;
#[allow(missing_docs)]
pub mod dynamic;
pub mod engine;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod frontier;
#[allow(missing_docs)]
pub mod gate;
pub mod markers;
#[allow(missing_docs)]
pub mod orchestrator;
#[allow(missing_docs)]
pub mod store;

// Re-export commonly used types
pub use classifier::{structured_types, PageClassifier, ProductMatch};
pub use dynamic::{DynamicContentController, MaterializeBudget, Materialized, STALL_LIMIT};
pub use engine::CrawlEngine;
pub use error::{CrawlError, Result};
pub use frontier::{Admission, FrontierLimits, FrontierManager};
pub use gate::{AccessGate, CaptchaResolver, CaptchaState, Fetched, ManualResolver, RetryPolicy};
pub use orchestrator::{
    BrowserSessions, CrawlContext, DomainOrchestrator, DomainReport, SessionFactory,
};
pub use store::{DomainResults, ResultStore, ShardWriter};
