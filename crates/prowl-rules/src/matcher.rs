//! Matchers shared by exclusion rules, classification patterns and marker
//! tables.

use crate::error::{Result, RuleError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compiled string or document matcher.
///
/// Regex and substring matchers are case-insensitive. Selector matchers only
/// apply to parsed documents.
#[derive(Clone)]
pub enum Matcher {
    /// Case-insensitive regular expression
    Regex(Regex),
    /// Case-insensitive substring, stored lowercased
    Substring(String),
    /// CSS selector, kept alongside its source text
    Selector {
        /// Selector source
        source: String,
        /// Compiled selector
        compiled: scraper::Selector,
    },
}

impl Matcher {
    /// Compile a case-insensitive regex matcher.
    pub fn regex(id: &str, pattern: &str) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Self::Regex)
            .map_err(|e| RuleError::InvalidPattern {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Build a case-insensitive substring matcher.
    #[must_use]
    pub fn substring(needle: &str) -> Self {
        Self::Substring(needle.to_lowercase())
    }

    /// Compile a CSS selector matcher.
    pub fn selector(id: &str, selector: &str) -> Result<Self> {
        let compiled = scraper::Selector::parse(selector).map_err(|e| RuleError::InvalidPattern {
            id: id.to_string(),
            reason: format!("invalid selector: {e}"),
        })?;
        Ok(Self::Selector {
            source: selector.to_string(),
            compiled,
        })
    }

    /// Test against a piece of text. Selector matchers never match text.
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(text),
            Self::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
            Self::Selector { .. } => false,
        }
    }

    /// Test against a parsed document.
    ///
    /// Selectors look for a matching element; text matchers run over the
    /// document's serialized HTML.
    #[must_use]
    pub fn matches_document(&self, document: &scraper::Html, html: &str) -> bool {
        match self {
            Self::Selector { compiled, .. } => document.select(compiled).next().is_some(),
            _ => self.matches_text(html),
        }
    }

    /// Whether this is a selector matcher.
    #[must_use]
    pub fn is_selector(&self) -> bool {
        matches!(self, Self::Selector { .. })
    }

    /// Source text of the pattern.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Regex(regex) => regex.as_str(),
            Self::Substring(needle) => needle,
            Self::Selector { source, .. } => source,
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Substring(needle) => f.debug_tuple("Substring").field(needle).finish(),
            Self::Selector { source, .. } => f.debug_tuple("Selector").field(source).finish(),
        }
    }
}

/// Which part of a URL an exclusion rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTarget {
    /// The whole URL
    #[default]
    Url,
    /// Only the path component
    Path,
}

/// Which domains a rule or pattern applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Applicability {
    /// Every domain
    Generic,
    /// Domains whose host key starts with this label, e.g. `amazon`
    Domain(String),
}

impl Applicability {
    /// Generic when `label` is `None`.
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some(label) => Self::Domain(label.to_lowercase()),
            None => Self::Generic,
        }
    }
}

/// One entry of a marker table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Present when an element matches the selector
    Selector(String),
    /// Present when the page text contains the phrase, case-insensitively
    Text(String),
}

/// A named, ordered list of page markers evaluated by one routine.
#[derive(Debug, Clone)]
pub struct MarkerTable {
    name: String,
    markers: Vec<Marker>,
}

impl MarkerTable {
    /// Build a table, rejecting selectors that do not parse.
    pub fn new(name: &str, markers: Vec<Marker>) -> Result<Self> {
        for marker in &markers {
            if let Marker::Selector(selector) = marker {
                Matcher::selector(name, selector)?;
            }
        }
        Ok(Self {
            name: name.to_string(),
            markers,
        })
    }

    /// Table name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Markers in evaluation order.
    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Selector markers only.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().filter_map(|m| match m {
            Marker::Selector(s) => Some(s.as_str()),
            Marker::Text(_) => None,
        })
    }

    /// Text markers only.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().filter_map(|m| match m {
            Marker::Text(t) => Some(t.as_str()),
            Marker::Selector(_) => None,
        })
    }

    /// Whether any text marker occurs in `text`, case-insensitively.
    #[must_use]
    pub fn phrase_in(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.phrases().any(|phrase| lowered.contains(&phrase.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_is_case_insensitive() {
        let m = Matcher::regex("dp", r"/dp/[A-Z0-9]{10}").unwrap();
        assert!(m.matches_text("https://www.amazon.in/dp/B0ABCDEF12"));
        assert!(m.matches_text("https://www.amazon.in/dp/b0abcdef12"));
        assert!(!m.matches_text("https://www.amazon.in/dp/short"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = Matcher::regex("broken", "(unclosed").unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn test_substring() {
        let m = Matcher::substring("/About-Us");
        assert!(m.matches_text("https://shop.example/about-us"));
        assert_eq!(m.source(), "/about-us");
    }

    #[test]
    fn test_selector_matches_documents_only() {
        let m = Matcher::selector("title", "#productTitle").unwrap();
        assert!(m.is_selector());
        assert!(!m.matches_text("#productTitle"));

        let html = r#"<html><body><span id="productTitle">Kettle</span></body></html>"#;
        let doc = scraper::Html::parse_document(html);
        assert!(m.matches_document(&doc, html));

        let text = Matcher::regex("buy", "Buy Now").unwrap();
        assert!(!text.matches_document(&doc, html));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        assert!(Matcher::selector("bad", "div[").is_err());
        assert!(MarkerTable::new("bad", vec![Marker::Selector("##".to_string())]).is_err());
    }

    #[test]
    fn test_marker_table_phrases() {
        let table = MarkerTable::new(
            "captcha",
            vec![
                Marker::Selector("#captchacharacters".to_string()),
                Marker::Text("Type the characters you see".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(table.selectors().count(), 1);
        assert_eq!(table.phrases().count(), 1);
        assert!(table.phrase_in("<p>Please TYPE the characters you see in this image</p>"));
        assert!(!table.phrase_in(r#"<input id="captchacharacters">"#));
    }

    #[test]
    fn test_applicability_from_label() {
        assert_eq!(Applicability::from_label(None), Applicability::Generic);
        assert_eq!(
            Applicability::from_label(Some("Amazon")),
            Applicability::Domain("amazon".to_string())
        );
    }
}
