//! Prowl Rules - declarative tables driving the crawler.
//!
//! Everything here is static configuration: URL exclusion rules, weighted
//! classification patterns with their per-domain tables, and the marker
//! tables used to detect rendered listings and CAPTCHA interstitials.
//!
//! # Example
//!
//! ```rust
//! use prowl_core::Domain;
//! use prowl_rules::Rulebook;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rules = Rulebook::builtin()?;
//! let shop = Domain::parse("shop.example")?;
//!
//! assert!(rules.exclusions.excluded("https://shop.example/about-us", &shop));
//! assert!(!rules.exclusions.excluded("https://shop.example/dp/B000123", &shop));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod defaults;
pub mod error;
pub mod exclusion;
pub mod loader;
pub mod matcher;
pub mod patterns;
pub mod rulebook;

pub use error::{Result, RuleError};
pub use exclusion::{Exclusion, ExclusionRule, ExclusionRuleSet};
pub use loader::{LoadSummary, RuleLoader};
pub use matcher::{Applicability, MatchTarget, Marker, MarkerTable, Matcher};
pub use patterns::{ClassificationPattern, PatternRegistry, PatternScope, PatternTable};
pub use rulebook::{Markers, Rulebook};
