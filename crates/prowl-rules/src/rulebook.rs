//! The complete rule set one crawl runs with.

use crate::defaults;
use crate::error::Result;
use crate::exclusion::ExclusionRuleSet;
use crate::loader::RuleLoader;
use crate::matcher::MarkerTable;
use crate::patterns::PatternRegistry;
use std::path::Path;

/// Page marker tables consulted while fetching and materializing pages.
#[derive(Debug, Clone)]
pub struct Markers {
    /// Elements whose visibility means listing content has rendered
    pub product_containers: MarkerTable,
    /// Signs of a CAPTCHA interstitial
    pub captcha: MarkerTable,
    /// Main-content markers that reappear once a CAPTCHA is solved
    pub captcha_resolved: MarkerTable,
    /// Button/link texts that load further listing entries
    pub load_more: Vec<String>,
}

/// Exclusions, classification tables and markers, read-only during a crawl.
#[derive(Debug, Clone)]
pub struct Rulebook {
    /// URL deny rules
    pub exclusions: ExclusionRuleSet,
    /// Classification and fast-path tables
    pub patterns: PatternRegistry,
    /// Marker tables
    pub markers: Markers,
}

impl Rulebook {
    /// The built-in tables.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            exclusions: defaults::exclusions()?,
            patterns: defaults::patterns()?,
            markers: defaults::markers()?,
        })
    }

    /// Built-in tables extended with the rules in a TOML file.
    pub fn with_file(path: &Path) -> Result<Self> {
        let mut rulebook = Self::builtin()?;
        RuleLoader::new(path)?.load_into(&mut rulebook)?;
        Ok(rulebook)
    }
}
