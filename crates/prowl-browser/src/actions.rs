use crate::error::Result;
use std::time::Duration;

/// Navigation completion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Return once the DOM has been parsed
    DomContentLoaded,
    /// Return once the load event fired
    Load,
}

/// Element state awaited by [`PageDriver::wait_for_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// Present in the DOM
    Attached,
    /// Present and rendered with a non-empty box
    Visible,
    /// Absent or not rendered
    Hidden,
    /// Absent from the DOM
    Detached,
}

/// The rendering collaborator every crawl session drives.
///
/// One implementor instance is one rendering session holding a single page;
/// it is not safe for concurrent navigation and callers use it sequentially.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page to a URL
    async fn navigate(&self, url: &str, wait: WaitMode, timeout: Duration) -> Result<()>;

    /// Evaluate a script expression in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Whether an element matching the selector currently exists
    async fn query_selector(&self, selector: &str) -> Result<bool>;

    /// Wait for a selector to reach a state; `Ok(false)` on timeout
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        timeout: Duration,
    ) -> Result<bool>;

    /// URL currently loaded, after redirects
    async fn current_url(&self) -> Result<String>;

    /// Serialized DOM
    async fn content(&self) -> Result<String>;

    /// Wait until no network activity is observed; `Err(Timeout)` if it never settles
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()>;

    /// Release the rendering session
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolve a link target against the page it was found on.
///
/// Returns `None` for non-http(s) targets (`mailto:`, `javascript:`) and
/// unparsable hrefs. Fragments are dropped so `#reviews` anchors collapse
/// onto the page itself.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    let mut resolved = base.join(href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("https://shop.example/c/shoes", "/dp/B000123#reviews").as_deref(),
            Some("https://shop.example/dp/B000123")
        );
        assert_eq!(
            absolutize("https://shop.example/c/shoes/", "boots").as_deref(),
            Some("https://shop.example/c/shoes/boots")
        );
        assert_eq!(absolutize("https://shop.example/", "mailto:a@b.c"), None);
        assert_eq!(absolutize("https://shop.example/", "javascript:void(0)"), None);
    }
}
