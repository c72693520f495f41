//! Weighted product-page classification.
//!
//! Confidence is the average weight of the patterns that matched, so many
//! weak hits never outscore a single strong one and the result stays in
//! `[0, 1]`.

use crate::error::{CrawlError, Result};
use prowl_core::{CrawlConfig, Domain};
use prowl_rules::{ClassificationPattern, PatternScope, Rulebook};
use scraper::Html;
use std::sync::Arc;

/// A positive product verdict for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductMatch {
    url: String,
    confidence: f64,
    patterns: Vec<String>,
}

impl ProductMatch {
    /// Build a verdict, rejecting confidences outside `[0, 1]`.
    pub fn new(url: &str, confidence: f64, patterns: Vec<String>) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CrawlError::InvalidConfidence {
                url: url.to_string(),
                confidence,
            });
        }
        Ok(Self {
            url: url.to_string(),
            confidence,
            patterns,
        })
    }

    /// The URL scored.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Average weight of matched patterns.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Identifiers of contributing patterns, in table order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Scores pages against the pattern table registered for their domain.
pub struct PageClassifier {
    rules: Arc<Rulebook>,
    record_threshold: f64,
    halt_threshold: f64,
}

impl PageClassifier {
    #[must_use]
    pub fn new(rules: Arc<Rulebook>, record_threshold: f64, halt_threshold: f64) -> Self {
        Self {
            rules,
            record_threshold,
            halt_threshold,
        }
    }

    #[must_use]
    pub fn from_config(rules: Arc<Rulebook>, config: &CrawlConfig) -> Self {
        Self::new(rules, config.record_threshold, config.halt_threshold)
    }

    /// Score a materialized page.
    ///
    /// Returns `Ok(None)` when nothing matched or the average falls below the
    /// record threshold.
    pub fn classify(
        &self,
        url: &str,
        content: &str,
        structured_data: &[String],
        domain: &Domain,
    ) -> Result<Option<ProductMatch>> {
        let table = self.rules.patterns.table_for(domain);

        let needs_document = table
            .scoped(PatternScope::Content)
            .any(|p| p.matcher().is_selector());
        let document = needs_document.then(|| Html::parse_document(content));
        let types = if table.scoped(PatternScope::StructuredData).next().is_some() {
            structured_types(structured_data)
        } else {
            Vec::new()
        };

        let mut total = 0.0;
        let mut matched = Vec::new();

        for pattern in table.iter() {
            if Self::pattern_matches(pattern, url, content, document.as_ref(), &types) {
                total += pattern.weight();
                matched.push(pattern.id().to_string());
            }
        }

        if matched.is_empty() {
            return Ok(None);
        }

        #[allow(clippy::cast_precision_loss)]
        let confidence = total / matched.len() as f64;
        let verdict = ProductMatch::new(url, confidence, matched)?;

        if verdict.confidence < self.record_threshold {
            tracing::trace!(url, confidence, "below record threshold");
            return Ok(None);
        }
        Ok(Some(verdict))
    }

    /// Whether a verdict is strong enough to stop descending from the page.
    #[must_use]
    pub fn halts_descent(&self, verdict: &ProductMatch) -> bool {
        verdict.confidence >= self.halt_threshold
    }

    fn pattern_matches(
        pattern: &ClassificationPattern,
        url: &str,
        content: &str,
        document: Option<&Html>,
        types: &[String],
    ) -> bool {
        let matcher = pattern.matcher();
        match pattern.scope() {
            PatternScope::Url => matcher.matches_text(url),
            PatternScope::Content => match document {
                Some(doc) => matcher.matches_document(doc, content),
                None => matcher.matches_text(content),
            },
            PatternScope::StructuredData => types.iter().any(|t| matcher.matches_text(t)),
        }
    }
}

/// `@type` values declared across JSON-LD blocks.
///
/// Follows top-level arrays and `@graph` containers; IRIs such as
/// `https://schema.org/Product` are reduced to their last segment.
/// Malformed blocks are skipped.
pub fn structured_types(blocks: &[String]) -> Vec<String> {
    fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            serde_json::Value::Object(map) => {
                match map.get("@type") {
                    Some(serde_json::Value::String(t)) => out.push(short_type(t)),
                    Some(serde_json::Value::Array(ts)) => out.extend(
                        ts.iter().filter_map(serde_json::Value::as_str).map(short_type),
                    ),
                    _ => {}
                }
                if let Some(graph) = map.get("@graph") {
                    collect(graph, out);
                }
            }
            _ => {}
        }
    }

    fn short_type(t: &str) -> String {
        t.rsplit(|c| c == '/' || c == '#').next().unwrap_or(t).to_string()
    }

    let mut out = Vec::new();
    for block in blocks {
        match serde_json::from_str::<serde_json::Value>(block) {
            Ok(value) => collect(&value, &mut out),
            Err(e) => tracing::debug!("skipping malformed JSON-LD block: {}", e),
        }
    }
    out
}
