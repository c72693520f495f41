//! Scripted in-memory page driver shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use prowl_browser::scripts::{
    load_more_phrase, EXTRACT_LINKS, FLUSH_RENDER, SCROLL_HEIGHT, SCROLL_TO_BOTTOM, STRUCTURED_DATA,
    VIEWPORT_HEIGHT,
};
use prowl_browser::{BrowserError, PageDriver, Result, SelectorState, WaitMode};
use prowl_core::{AppConfig, Domain};
use prowl_crawler::SessionFactory;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const CAPTCHA_HTML: &str = r#"<html><body>
<form action="/errors/validateCaptcha"><input id="captchacharacters" name="field-keywords"></form>
<p>Enter the characters you see below</p>
</body></html>"#;

/// One page of the scripted site.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub html: String,
    pub links: Vec<String>,
    pub scroll_batches: Vec<Vec<String>>,
    pub height: u64,
    pub viewport: u64,
    pub structured: Vec<String>,
    /// `Some(None)`: CAPTCHA never clears; `Some(Some(d))`: clears after `d`
    pub captcha: Option<Option<Duration>>,
    /// Label of a load-more control and the links it reveals once clicked
    pub load_more: Option<(String, Vec<String>)>,
}

impl MockPage {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }

    pub fn links(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|l| (*l).to_string()).collect();
        self
    }

    pub fn scrolling(mut self, height: u64, viewport: u64, batches: Vec<Vec<String>>) -> Self {
        self.height = height;
        self.viewport = viewport;
        self.scroll_batches = batches;
        self
    }

    pub fn captcha(mut self, resolves_after: Option<Duration>) -> Self {
        self.captcha = Some(resolves_after);
        self
    }

    pub fn load_more(mut self, label: &str, revealed: Vec<String>) -> Self {
        self.load_more = Some((label.to_string(), revealed));
        self
    }

    pub fn structured(mut self, block: &str) -> Self {
        self.structured.push(block.to_string());
        self
    }
}

#[derive(Default)]
struct State {
    pages: HashMap<String, MockPage>,
    current: Option<String>,
    loaded_at: Option<Instant>,
    scrolls: usize,
    failures: HashMap<String, u32>,
    crashes: HashSet<String>,
    closed: bool,
    navigations: HashMap<String, u32>,
    load_more_probes: u32,
    load_more_clicked: bool,
    hang_on_close: bool,
}

impl State {
    fn current_page(&self) -> Result<&MockPage> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .ok_or_else(|| BrowserError::NavigationError("no page loaded".to_string()))
    }

    fn current_html(&self) -> Result<String> {
        let page = self.current_page()?;
        if let Some(plan) = page.captcha {
            let elapsed = self.loaded_at.map(|t| t.elapsed()).unwrap_or_default();
            let cleared = plan.is_some_and(|after| elapsed >= after);
            if !cleared {
                return Ok(CAPTCHA_HTML.to_string());
            }
        }
        Ok(page.html.clone())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(BrowserError::SessionClosed("browser crashed".to_string()));
        }
        Ok(())
    }
}

/// Page driver answering from a scripted site. Clones share state.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<State>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: MockPage) -> Self {
        self.lock().pages.insert(url.to_string(), page);
        self
    }

    /// Fail the next `times` navigations to `url` with a transient error.
    pub fn fail(self, url: &str, times: u32) -> Self {
        self.lock().failures.insert(url.to_string(), times);
        self
    }

    /// Kill the session when `url` is navigated to.
    pub fn crash_on(self, url: &str) -> Self {
        self.lock().crashes.insert(url.to_string());
        self
    }

    /// Never finish closing the session.
    pub fn hang_on_close(self) -> Self {
        self.lock().hang_on_close = true;
        self
    }

    pub fn navigations(&self, url: &str) -> u32 {
        self.lock().navigations.get(url).copied().unwrap_or(0)
    }

    pub fn total_navigations(&self) -> u32 {
        self.lock().navigations.values().sum()
    }

    pub fn load_more_probes(&self) -> u32 {
        self.lock().load_more_probes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("acquire mock lock")
    }

    fn selector_present(&self, selector: &str) -> Result<bool> {
        let html = self.lock().current_html()?;
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::ScriptError(format!("bad selector {selector}: {e}")))?;
        Ok(Html::parse_document(&html).select(&parsed).next().is_some())
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str, _wait: WaitMode, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        *state.navigations.entry(url.to_string()).or_default() += 1;

        if state.crashes.contains(url) {
            state.closed = true;
            return Err(BrowserError::SessionClosed("browser crashed".to_string()));
        }
        if let Some(remaining) = state.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::Timeout(format!("{url} timed out")));
            }
        }
        if !state.pages.contains_key(url) {
            return Err(BrowserError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        }

        state.current = Some(url.to_string());
        state.loaded_at = Some(Instant::now());
        state.scrolls = 0;
        state.load_more_clicked = false;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.lock();
        state.ensure_open()?;
        let scrolls = state.scrolls;
        let page = state.current_page()?.clone();

        match script {
            EXTRACT_LINKS => {
                let mut links = page.links.clone();
                for batch in page.scroll_batches.iter().take(scrolls) {
                    links.extend(batch.iter().cloned());
                }
                if let (true, Some((_, revealed))) = (state.load_more_clicked, &page.load_more) {
                    links.extend(revealed.iter().cloned());
                }
                Ok(serde_json::json!(links))
            }
            SCROLL_HEIGHT => Ok(serde_json::json!(page.height)),
            VIEWPORT_HEIGHT => Ok(serde_json::json!(page.viewport)),
            SCROLL_TO_BOTTOM => {
                state.scrolls += 1;
                Ok(serde_json::Value::Null)
            }
            FLUSH_RENDER => Ok(serde_json::Value::Null),
            STRUCTURED_DATA => Ok(serde_json::json!(page.structured)),
            _ => match load_more_phrase(script) {
                Some(phrase) => {
                    state.load_more_probes += 1;
                    let hit = !state.load_more_clicked
                        && page
                            .load_more
                            .as_ref()
                            .is_some_and(|(label, _)| label.to_lowercase().contains(&phrase));
                    if hit {
                        state.load_more_clicked = true;
                    }
                    Ok(serde_json::Value::Bool(hit))
                }
                None => Err(BrowserError::ScriptError("unknown script".to_string())),
            },
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<bool> {
        self.lock().ensure_open()?;
        self.selector_present(selector)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        _timeout: Duration,
    ) -> Result<bool> {
        self.lock().ensure_open()?;
        let present = self.selector_present(selector)?;
        Ok(match state {
            SelectorState::Attached | SelectorState::Visible => present,
            SelectorState::Hidden | SelectorState::Detached => !present,
        })
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.lock();
        state.ensure_open()?;
        state
            .current
            .clone()
            .ok_or_else(|| BrowserError::NavigationError("no page loaded".to_string()))
    }

    async fn content(&self) -> Result<String> {
        let state = self.lock();
        state.ensure_open()?;
        state.current_html()
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<()> {
        self.lock().ensure_open()
    }

    async fn close(&self) -> Result<()> {
        let hang = self.lock().hang_on_close;
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Hands out the same scripted driver for every domain.
pub struct MockSessions {
    pub driver: MockDriver,
}

#[async_trait]
impl SessionFactory for MockSessions {
    async fn open(&self, _domain: &Domain) -> Result<Box<dyn PageDriver>> {
        Ok(Box::new(self.driver.clone()))
    }
}

/// Config for one domain with test-friendly waits.
pub fn config_for(domain: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.crawl.domains = vec![Domain::parse(domain).expect("valid domain")];
    config
}

/// `count` distinct absolute links under `prefix`.
pub fn links(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}
