//! Extra rules loaded from a TOML file.
//!
//! A rule file extends the built-in tables; it never replaces them.
//!
//! ```toml
//! load_more = ["more deals"]
//!
//! [[exclusion]]
//! id = "shop-outlet"
//! domain = "shop"          # omit for a global rule
//! target = "path"          # "url" (default) or "path"
//! substring = "/outlet"
//!
//! [[pattern]]
//! id = "shop-sku"
//! domain = "shop"
//! scope = "content"        # "url" (default), "content" or "structured-data"
//! selector = "[data-sku]"
//! weight = 0.8
//!
//! [[fast_path]]
//! id = "shop-item"
//! domain = "shop"
//! regex = "/item/\\d{6}"
//! weight = 0.95
//! ```

use crate::error::{Result, RuleError};
use crate::exclusion::ExclusionRule;
use crate::matcher::{Applicability, MatchTarget, Matcher};
use crate::patterns::{ClassificationPattern, PatternScope};
use crate::rulebook::Rulebook;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    load_more: Vec<String>,
    #[serde(default)]
    exclusion: Vec<ExclusionEntry>,
    #[serde(default)]
    pattern: Vec<PatternEntry>,
    #[serde(default)]
    fast_path: Vec<PatternEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct MatcherEntry {
    regex: Option<String>,
    substring: Option<String>,
    selector: Option<String>,
}

impl MatcherEntry {
    fn compile(&self, id: &str) -> Result<Matcher> {
        match (&self.regex, &self.substring, &self.selector) {
            (Some(re), None, None) => Matcher::regex(id, re),
            (None, Some(needle), None) => Ok(Matcher::substring(needle)),
            (None, None, Some(selector)) => Matcher::selector(id, selector),
            _ => Err(RuleError::Unsupported {
                id: id.to_string(),
                reason: "exactly one of regex, substring or selector is required".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExclusionEntry {
    id: String,
    domain: Option<String>,
    #[serde(default)]
    target: MatchTarget,
    #[serde(flatten)]
    matcher: MatcherEntry,
}

#[derive(Debug, Deserialize)]
struct PatternEntry {
    id: String,
    domain: Option<String>,
    #[serde(default)]
    scope: PatternScope,
    weight: f64,
    #[serde(flatten)]
    matcher: MatcherEntry,
}

impl PatternEntry {
    fn build(&self) -> Result<ClassificationPattern> {
        ClassificationPattern::new(
            &self.id,
            self.matcher.compile(&self.id)?,
            self.weight,
            self.scope,
            Applicability::from_label(self.domain.as_deref()),
        )
    }
}

/// Counts of rules added from one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Exclusion rules added
    pub exclusions: usize,
    /// Classification patterns added
    pub patterns: usize,
    /// Fast-path patterns added
    pub fast_paths: usize,
    /// Load-more phrases added
    pub load_more: usize,
}

/// Loader for a single rule file.
pub struct RuleLoader {
    path: PathBuf,
}

impl RuleLoader {
    /// Create a loader for `path`.
    ///
    /// # Errors
    /// Returns error if the file doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(RuleError::NotFound {
                path: path.display().to_string(),
            });
        }
        Ok(Self { path })
    }

    /// Path this loader reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the file and add every rule in it to `rulebook`.
    ///
    /// The file is validated in full before anything is added, so a bad
    /// entry leaves `rulebook` untouched.
    ///
    /// # Errors
    /// Unreadable file, TOML errors, or any invalid regex, selector or weight.
    pub fn load_into(&self, rulebook: &mut Rulebook) -> Result<LoadSummary> {
        let contents = std::fs::read_to_string(&self.path)?;
        let file: RuleFile = toml::from_str(&contents).map_err(|source| RuleError::ParseError {
            path: self.path.display().to_string(),
            source,
        })?;

        let exclusions = file
            .exclusion
            .iter()
            .map(|entry| {
                Ok(ExclusionRule {
                    id: entry.id.clone(),
                    matcher: entry.matcher.compile(&entry.id)?,
                    target: entry.target,
                    applies_to: Applicability::from_label(entry.domain.as_deref()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let patterns = file
            .pattern
            .iter()
            .map(PatternEntry::build)
            .collect::<Result<Vec<_>>>()?;
        let fast_paths = file
            .fast_path
            .iter()
            .map(PatternEntry::build)
            .collect::<Result<Vec<_>>>()?;
        if let Some(bad) = fast_paths.iter().find(|p| p.scope() != PatternScope::Url) {
            return Err(RuleError::Unsupported {
                id: bad.id().to_string(),
                reason: "fast-path patterns must be URL-scoped".to_string(),
            });
        }

        let summary = LoadSummary {
            exclusions: exclusions.len(),
            patterns: patterns.len(),
            fast_paths: fast_paths.len(),
            load_more: file.load_more.len(),
        };

        for rule in exclusions {
            rulebook.exclusions.add(rule);
        }
        for pattern in patterns {
            rulebook.patterns.add(pattern);
        }
        for pattern in fast_paths {
            rulebook.patterns.add_fast_path(pattern)?;
        }
        rulebook
            .markers
            .load_more
            .extend(file.load_more.into_iter().map(|p| p.to_lowercase()));

        info!(
            path = %self.path.display(),
            exclusions = summary.exclusions,
            patterns = summary.patterns,
            fast_paths = summary.fast_paths,
            "loaded rule file"
        );

        Ok(summary)
    }
}
