//! Weighted classification patterns and their per-domain tables.

use crate::error::{Result, RuleError};
use crate::matcher::{Applicability, Matcher};
use prowl_core::Domain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternScope {
    /// The page URL
    #[default]
    Url,
    /// The serialized page content
    Content,
    /// `@type` values found in JSON-LD blocks
    StructuredData,
}

/// One weighted piece of product evidence. Immutable once built.
#[derive(Debug, Clone)]
pub struct ClassificationPattern {
    id: String,
    matcher: Matcher,
    weight: f64,
    scope: PatternScope,
    applies_to: Applicability,
}

impl ClassificationPattern {
    /// Build a pattern, validating the weight and the matcher/scope pairing.
    ///
    /// # Errors
    /// Weight outside (0, 1], or a selector used outside content scope.
    pub fn new(
        id: &str,
        matcher: Matcher,
        weight: f64,
        scope: PatternScope,
        applies_to: Applicability,
    ) -> Result<Self> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(RuleError::InvalidWeight {
                id: id.to_string(),
                weight,
            });
        }
        if matcher.is_selector() && scope != PatternScope::Content {
            return Err(RuleError::Unsupported {
                id: id.to_string(),
                reason: "selector matchers are only valid for content scope".to_string(),
            });
        }

        Ok(Self {
            id: id.to_string(),
            matcher,
            weight,
            scope,
            applies_to,
        })
    }

    /// Identifier reported in product matches.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The compiled matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Evidence weight in (0, 1].
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Scope tag.
    #[must_use]
    pub fn scope(&self) -> PatternScope {
        self.scope
    }

    /// Domain applicability.
    #[must_use]
    pub fn applies_to(&self) -> &Applicability {
        &self.applies_to
    }
}

/// An ordered set of patterns evaluated together.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    patterns: Vec<ClassificationPattern>,
}

impl PatternTable {
    /// Table from patterns in evaluation order.
    #[must_use]
    pub fn new(patterns: Vec<ClassificationPattern>) -> Self {
        Self { patterns }
    }

    /// Append a pattern.
    pub fn push(&mut self, pattern: ClassificationPattern) {
        self.patterns.push(pattern);
    }

    /// Iterate patterns in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassificationPattern> {
        self.patterns.iter()
    }

    /// Patterns of one scope.
    pub fn scoped(&self, scope: PatternScope) -> impl Iterator<Item = &ClassificationPattern> {
        self.patterns.iter().filter(move |p| p.scope == scope)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the table has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Generic and domain-specific pattern tables, plus fast-path URL tables.
///
/// Domain tables are exclusive: a domain with its own table is never scored
/// against the generic one.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    generic: PatternTable,
    by_domain: HashMap<String, PatternTable>,
    fast_path: HashMap<String, PatternTable>,
}

impl PatternRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a classification pattern to the table its applicability names.
    pub fn add(&mut self, pattern: ClassificationPattern) {
        match pattern.applies_to.clone() {
            Applicability::Generic => self.generic.push(pattern),
            Applicability::Domain(label) => self.by_domain.entry(label).or_default().push(pattern),
        }
    }

    /// Add a fast-path URL pattern. Generic fast-path patterns apply to every
    /// domain without a table of its own.
    ///
    /// # Errors
    /// The pattern is not URL-scoped.
    pub fn add_fast_path(&mut self, pattern: ClassificationPattern) -> Result<()> {
        if pattern.scope != PatternScope::Url {
            return Err(RuleError::Unsupported {
                id: pattern.id,
                reason: "fast-path patterns must be URL-scoped".to_string(),
            });
        }
        let key = match &pattern.applies_to {
            Applicability::Generic => String::new(),
            Applicability::Domain(label) => label.clone(),
        };
        self.fast_path.entry(key).or_default().push(pattern);
        Ok(())
    }

    /// The table `domain` is scored against.
    #[must_use]
    pub fn table_for(&self, domain: &Domain) -> &PatternTable {
        self.by_domain.get(domain.label()).unwrap_or(&self.generic)
    }

    /// Whether `domain` has a dedicated table.
    #[must_use]
    pub fn has_domain_table(&self, domain: &Domain) -> bool {
        self.by_domain.contains_key(domain.label())
    }

    /// The generic table.
    #[must_use]
    pub fn generic(&self) -> &PatternTable {
        &self.generic
    }

    /// First fast-path pattern matching `url`, if the shape alone is decisive.
    #[must_use]
    pub fn fast_path_match(&self, url: &str, domain: &Domain) -> Option<&ClassificationPattern> {
        let table = self
            .fast_path
            .get(domain.label())
            .or_else(|| self.fast_path.get(""))?;
        table.iter().find(|p| p.matcher.matches_text(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_pattern(id: &str, re: &str, weight: f64, applies_to: Applicability) -> ClassificationPattern {
        ClassificationPattern::new(
            id,
            Matcher::regex(id, re).unwrap(),
            weight,
            PatternScope::Url,
            applies_to,
        )
        .unwrap()
    }

    #[test]
    fn test_weight_bounds() {
        for weight in [0.0, -0.1, 1.01, f64::NAN] {
            let result = ClassificationPattern::new(
                "w",
                Matcher::substring("/dp/"),
                weight,
                PatternScope::Url,
                Applicability::Generic,
            );
            assert!(matches!(result, Err(RuleError::InvalidWeight { .. })), "{weight}");
        }
        assert!(ClassificationPattern::new(
            "w",
            Matcher::substring("/dp/"),
            1.0,
            PatternScope::Url,
            Applicability::Generic,
        )
        .is_ok());
    }

    #[test]
    fn test_selector_requires_content_scope() {
        let result = ClassificationPattern::new(
            "title",
            Matcher::selector("title", "#productTitle").unwrap(),
            0.9,
            PatternScope::Url,
            Applicability::Generic,
        );
        assert!(matches!(result, Err(RuleError::Unsupported { .. })));
    }

    #[test]
    fn test_domain_tables_are_exclusive() {
        let mut registry = PatternRegistry::new();
        registry.add(url_pattern("generic-dp", "/dp/", 0.95, Applicability::Generic));
        registry.add(url_pattern(
            "amazon-dp",
            "/dp/[A-Z0-9]{10}",
            0.95,
            Applicability::Domain("amazon".to_string()),
        ));

        let amazon = Domain::parse("amazon.in").unwrap();
        let shop = Domain::parse("shop.example").unwrap();

        assert!(registry.has_domain_table(&amazon));
        assert_eq!(registry.table_for(&amazon).iter().next().unwrap().id(), "amazon-dp");
        assert_eq!(registry.table_for(&amazon).len(), 1);
        assert_eq!(registry.table_for(&shop).iter().next().unwrap().id(), "generic-dp");
    }

    #[test]
    fn test_fast_path() {
        let mut registry = PatternRegistry::new();
        registry
            .add_fast_path(url_pattern(
                "amazon-dp",
                "/dp/[A-Z0-9]{10}",
                0.95,
                Applicability::Domain("amazon".to_string()),
            ))
            .unwrap();

        let amazon = Domain::parse("amazon.com").unwrap();
        let shop = Domain::parse("shop.example").unwrap();

        assert!(registry
            .fast_path_match("https://www.amazon.com/Kettle/dp/B0ABCDEF12", &amazon)
            .is_some());
        assert!(registry
            .fast_path_match("https://www.amazon.com/gp/bestsellers", &amazon)
            .is_none());
        assert!(registry
            .fast_path_match("https://shop.example/dp/B0ABCDEF12", &shop)
            .is_none());
    }

    #[test]
    fn test_fast_path_must_be_url_scoped() {
        let mut registry = PatternRegistry::new();
        let content = ClassificationPattern::new(
            "buy",
            Matcher::substring("buy now"),
            0.7,
            PatternScope::Content,
            Applicability::Generic,
        )
        .unwrap();
        assert!(registry.add_fast_path(content).is_err());
    }
}
