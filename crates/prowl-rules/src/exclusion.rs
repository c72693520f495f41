//! URL exclusion rules evaluated before a URL may enter the frontier.

use crate::matcher::{Applicability, MatchTarget, Matcher};
use prowl_core::Domain;
use std::collections::HashMap;
use std::fmt;

/// A single deny rule.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    /// Stable identifier, reported when the rule fires
    pub id: String,
    /// What to look for
    pub matcher: Matcher,
    /// Which part of the URL to test
    pub target: MatchTarget,
    /// Global or tied to one domain label
    pub applies_to: Applicability,
}

impl ExclusionRule {
    /// Rule testing the lowercased URL path for a substring.
    #[must_use]
    pub fn path_contains(id: &str, needle: &str, applies_to: Applicability) -> Self {
        Self {
            id: id.to_string(),
            matcher: Matcher::substring(needle),
            target: MatchTarget::Path,
            applies_to,
        }
    }

    /// Rule testing the whole lowercased URL for a substring.
    #[must_use]
    pub fn url_contains(id: &str, needle: &str, applies_to: Applicability) -> Self {
        Self {
            id: id.to_string(),
            matcher: Matcher::substring(needle),
            target: MatchTarget::Url,
            applies_to,
        }
    }

    fn fires(&self, url: &str, path: &str) -> bool {
        match self.target {
            MatchTarget::Url => self.matcher.matches_text(url),
            MatchTarget::Path => self.matcher.matches_text(path),
        }
    }
}

/// Why a URL was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Not parseable as an absolute http(s) URL
    Malformed,
    /// Host does not belong to the crawl domain
    DomainMismatch,
    /// A rule tied to the crawl domain fired
    DomainRule(String),
    /// A global rule fired
    GlobalRule(String),
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed URL"),
            Self::DomainMismatch => write!(f, "outside crawl domain"),
            Self::DomainRule(id) => write!(f, "domain rule {id}"),
            Self::GlobalRule(id) => write!(f, "global rule {id}"),
        }
    }
}

/// Global plus per-domain deny rules.
///
/// Evaluation is pure and ordered: domain mismatch first, then rules for the
/// crawl domain's label, then global rules. The first hit wins.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRuleSet {
    global: Vec<ExclusionRule>,
    by_domain: HashMap<String, Vec<ExclusionRule>>,
}

impl ExclusionRuleSet {
    /// Empty rule set; only the domain-mismatch check applies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to the global or per-domain list.
    pub fn add(&mut self, rule: ExclusionRule) {
        match &rule.applies_to {
            Applicability::Generic => self.global.push(rule),
            Applicability::Domain(label) => self
                .by_domain
                .entry(label.clone())
                .or_default()
                .push(rule),
        }
    }

    /// Number of rules across all lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.global.len() + self.by_domain.values().map(Vec::len).sum::<usize>()
    }

    /// Whether no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `url` must never be enqueued for `domain`.
    #[must_use]
    pub fn excluded(&self, url: &str, domain: &Domain) -> bool {
        self.explain(url, domain).is_some()
    }

    /// The first exclusion that applies to `url`, if any.
    #[must_use]
    pub fn explain(&self, url: &str, domain: &Domain) -> Option<Exclusion> {
        let Ok(parsed) = url::Url::parse(url) else {
            return Some(Exclusion::Malformed);
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return Some(Exclusion::Malformed);
        }
        let Some(host) = parsed.host_str() else {
            return Some(Exclusion::Malformed);
        };

        if !domain.owns_host(host) {
            return Some(Exclusion::DomainMismatch);
        }

        let lowered = url.to_lowercase();
        let path = parsed.path().to_lowercase();

        if let Some(rules) = self.by_domain.get(domain.label()) {
            if let Some(rule) = rules.iter().find(|r| r.fires(&lowered, &path)) {
                return Some(Exclusion::DomainRule(rule.id.clone()));
            }
        }

        self.global
            .iter()
            .find(|r| r.fires(&lowered, &path))
            .map(|rule| Exclusion::GlobalRule(rule.id.clone()))
    }
}
