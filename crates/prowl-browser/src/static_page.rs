//! HTTP-only page driver.
//!
//! Fetches documents with reqwest and answers the shared page scripts from
//! the parsed HTML. Nothing executes, so scrolling is a no-op and heights
//! report zero, which keeps the scroll loop from ever engaging.

use crate::actions::{absolutize, PageDriver, SelectorState, WaitMode};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::scripts::{
    self, EXTRACT_LINKS, FLUSH_RENDER, SCROLL_HEIGHT, SCROLL_TO_BOTTOM, STRUCTURED_DATA,
    VIEWPORT_HEIGHT,
};
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use std::sync::Mutex;
use std::time::Duration;

struct Loaded {
    url: String,
    body: String,
}

/// Page driver backed by plain HTTP GETs
pub struct StaticPage {
    client: reqwest::Client,
    loaded: Mutex<Option<Loaded>>,
}

impl StaticPage {
    /// Build a driver presenting the fingerprint's user agent
    pub fn new(fingerprint: &FingerprintConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(fingerprint.user_agent.clone())
            .build()
            .map_err(|e| BrowserError::ChromiumError(format!("http client: {e}")))?;

        Ok(Self {
            client,
            loaded: Mutex::new(None),
        })
    }

    /// A driver preloaded with a document, without touching the network
    pub fn from_html(url: &str, html: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            loaded: Mutex::new(Some(Loaded {
                url: url.to_string(),
                body: html.to_string(),
            })),
        }
    }

    /// Fetch a URL, returning status, headers and body
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<(u16, HeaderMap, String)> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| map_reqwest(url, e))?;
        Ok((status, headers, body))
    }

    fn with_document<T>(&self, f: impl FnOnce(&str, &Html) -> T) -> Result<T> {
        let guard = self.loaded.lock().expect("acquire page lock");
        let loaded = guard
            .as_ref()
            .ok_or_else(|| BrowserError::NavigationError("no document loaded".to_string()))?;
        let document = Html::parse_document(&loaded.body);
        Ok(f(&loaded.url, &document))
    }

    fn selector_present(&self, selector: &str) -> Result<bool> {
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::ScriptError(format!("invalid selector {selector}: {e}")))?;
        self.with_document(|_, document| document.select(&parsed).next().is_some())
    }

    fn links(&self) -> Result<serde_json::Value> {
        let anchors = Selector::parse("a[href]").expect("valid anchor selector");
        self.with_document(|base, document| {
            let links = document
                .select(&anchors)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| absolutize(base, href))
                .map(serde_json::Value::String)
                .collect();
            serde_json::Value::Array(links)
        })
    }

    fn structured_data(&self) -> Result<serde_json::Value> {
        let blocks = Selector::parse(r#"script[type="application/ld+json"]"#)
            .expect("valid ld+json selector");
        self.with_document(|_, document| {
            let texts = document
                .select(&blocks)
                .map(|el| serde_json::Value::String(el.text().collect()))
                .collect();
            serde_json::Value::Array(texts)
        })
    }
}

fn map_reqwest(url: &str, e: reqwest::Error) -> BrowserError {
    if e.is_timeout() {
        BrowserError::Timeout(format!("GET {url}: {e}"))
    } else {
        BrowserError::NavigationError(format!("GET {url}: {e}"))
    }
}

#[async_trait::async_trait]
impl PageDriver for StaticPage {
    async fn navigate(&self, url: &str, _wait: WaitMode, timeout: Duration) -> Result<()> {
        let (status, _headers, body) = self.get(url, timeout).await?;
        if !(200..300).contains(&status) {
            return Err(BrowserError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        tracing::trace!(url, status, bytes = body.len(), "fetched document");
        *self.loaded.lock().expect("acquire page lock") = Some(Loaded {
            url: url.to_string(),
            body,
        });
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        match script {
            EXTRACT_LINKS => self.links(),
            STRUCTURED_DATA => self.structured_data(),
            SCROLL_HEIGHT | VIEWPORT_HEIGHT => Ok(serde_json::json!(0)),
            SCROLL_TO_BOTTOM | FLUSH_RENDER => Ok(serde_json::Value::Null),
            _ if scripts::load_more_phrase(script).is_some() => Ok(serde_json::Value::Bool(false)),
            _ => Err(BrowserError::ScriptError(
                "scripts do not run on static pages".to_string(),
            )),
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<bool> {
        self.selector_present(selector)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        _timeout: Duration,
    ) -> Result<bool> {
        let present = self.selector_present(selector)?;
        Ok(match state {
            SelectorState::Attached | SelectorState::Visible => present,
            SelectorState::Hidden | SelectorState::Detached => !present,
        })
    }

    async fn current_url(&self) -> Result<String> {
        self.with_document(|url, _| url.to_string())
    }

    async fn content(&self) -> Result<String> {
        let guard = self.loaded.lock().expect("acquire page lock");
        guard
            .as_ref()
            .map(|loaded| loaded.body.clone())
            .ok_or_else(|| BrowserError::NavigationError("no document loaded".to_string()))
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}
