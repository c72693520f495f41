//! Page scripts shared by both engines.
//!
//! The chromium engine evaluates these verbatim; the static engine answers
//! the same constants from parsed HTML, so callers stay engine-agnostic.

use crate::actions::PageDriver;
use crate::error::{BrowserError, Result};

/// Absolute http(s) targets of every `a[href]`.
pub const EXTRACT_LINKS: &str = r#"(() => Array.from(document.querySelectorAll('a[href]'))
    .map(a => a.href)
    .filter(href => href.startsWith('http')))()"#;

/// Full document height.
pub const SCROLL_HEIGHT: &str = "document.documentElement.scrollHeight";

/// Viewport height.
pub const VIEWPORT_HEIGHT: &str = "window.innerHeight";

/// Scroll to the bottom of the document.
pub const SCROLL_TO_BOTTOM: &str =
    "(() => { window.scrollTo(0, document.documentElement.scrollHeight); return true; })()";

/// Yield one animation frame plus a short timer so deferred rendering runs.
pub const FLUSH_RENDER: &str = r#"new Promise((resolve) => {
    requestAnimationFrame(() => {
        setTimeout(() => resolve(true), 1000);
    });
})"#;

/// Text of every JSON-LD block.
pub const STRUCTURED_DATA: &str = r#"(() => Array.from(
    document.querySelectorAll('script[type="application/ld+json"]')
).map(el => el.textContent))()"#;

/// Prefix shared by every load-more activation script.
pub const LOAD_MORE_PREFIX: &str = "/* load-more */";

/// Click the first button or link whose text contains `phrase`,
/// case-insensitively. Evaluates to whether anything was clicked.
pub fn load_more_script(phrase: &str) -> String {
    let needle = serde_json::Value::String(phrase.to_lowercase()).to_string();
    format!(
        r#"{LOAD_MORE_PREFIX} (() => {{
    const needle = {needle};
    const candidates = document.querySelectorAll('button, a, [role="button"]');
    for (const el of candidates) {{
        const text = (el.innerText || el.textContent || '').trim().toLowerCase();
        if (text.includes(needle)) {{
            el.click();
            return true;
        }}
    }}
    return false;
}})()"#
    )
}

/// Phrase embedded in a script built by [`load_more_script`].
pub fn load_more_phrase(script: &str) -> Option<String> {
    let rest = script.strip_prefix(LOAD_MORE_PREFIX)?;
    let start = rest.find("const needle = ")? + "const needle = ".len();
    let end = rest[start..].find(";\n")? + start;
    serde_json::from_str(&rest[start..end]).ok()
}

/// Typed wrappers over [`PageDriver::evaluate`] for the scripts above.
#[async_trait::async_trait]
pub trait PageScripts {
    async fn extract_links(&self) -> Result<Vec<String>>;
    async fn scroll_height(&self) -> Result<u64>;
    async fn viewport_height(&self) -> Result<u64>;
    async fn scroll_to_bottom(&self) -> Result<()>;
    async fn flush_render(&self) -> Result<()>;
    async fn structured_data_blocks(&self) -> Result<Vec<String>>;
    async fn activate_by_text(&self, phrase: &str) -> Result<bool>;
}

#[async_trait::async_trait]
impl<T: PageDriver + ?Sized> PageScripts for T {
    async fn extract_links(&self) -> Result<Vec<String>> {
        let value = self.evaluate(EXTRACT_LINKS).await?;
        string_list(value, "links")
    }

    async fn scroll_height(&self) -> Result<u64> {
        let value = self.evaluate(SCROLL_HEIGHT).await?;
        as_pixels(&value, "scroll height")
    }

    async fn viewport_height(&self) -> Result<u64> {
        let value = self.evaluate(VIEWPORT_HEIGHT).await?;
        as_pixels(&value, "viewport height")
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.evaluate(SCROLL_TO_BOTTOM).await.map(|_| ())
    }

    async fn flush_render(&self) -> Result<()> {
        self.evaluate(FLUSH_RENDER).await.map(|_| ())
    }

    async fn structured_data_blocks(&self) -> Result<Vec<String>> {
        let value = self.evaluate(STRUCTURED_DATA).await?;
        string_list(value, "structured data")
    }

    async fn activate_by_text(&self, phrase: &str) -> Result<bool> {
        let value = self.evaluate(&load_more_script(phrase)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

fn string_list(value: serde_json::Value, what: &str) -> Result<Vec<String>> {
    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(BrowserError::ScriptError(format!(
            "expected {what} array, got {other}"
        ))),
    }
}

fn as_pixels(value: &serde_json::Value, what: &str) -> Result<u64> {
    value
        .as_f64()
        .filter(|px| *px >= 0.0)
        .map(|px| px.round() as u64)
        .ok_or_else(|| BrowserError::ScriptError(format!("expected {what} number, got {value}")))
}
