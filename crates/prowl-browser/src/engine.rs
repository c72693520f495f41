use crate::actions::{PageDriver, SelectorState, WaitMode};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use prowl_core::BrowserConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Poll interval for selector and network-idle waits
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Resource count must hold still this long to count as network idle
const IDLE_WINDOW: Duration = Duration::from_millis(500);

const READY_COMPLETE: &str = r#"new Promise((resolve) => {
    if (document.readyState === 'complete') {
        resolve(true);
    } else {
        window.addEventListener('load', () => resolve(true));
    }
})"#;

const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";

/// Browser automation engine
///
/// Each engine owns its own Chromium process, so a crash only takes down the
/// crawl session that launched it.
pub struct BrowserEngine {
    browser: Browser,
    fingerprint: FingerprintConfig,
    alive: Arc<AtomicBool>,
}

impl BrowserEngine {
    /// Create a new browser engine with default configuration
    pub async fn new() -> Result<Self> {
        Self::with_fingerprint(FingerprintConfig::randomized(), true).await
    }

    /// Launch with window size, headless mode and user agent taken from config
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        Self::with_fingerprint(FingerprintConfig::from_config(config), config.headless).await
    }

    /// Create a new browser engine with specific fingerprint
    pub async fn with_fingerprint(fingerprint: FingerprintConfig, headless: bool) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .viewport(Viewport {
                width: fingerprint.viewport_width,
                height: fingerprint.viewport_height,
                ..Viewport::default()
            });
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = alive.clone();

        // Spawn browser handler; the session is dead once it stops
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("browser handler stopped: {}", e);
                    break;
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            browser,
            fingerprint,
            alive,
        })
    }

    /// Open the single page this session navigates with
    pub async fn into_page(self) -> Result<BrowserPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        page.set_user_agent(self.fingerprint.user_agent.clone())
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        Ok(BrowserPage {
            page,
            browser: Mutex::new(Some(self.browser)),
            alive: self.alive,
        })
    }
}

/// A Chromium page driven over CDP
pub struct BrowserPage {
    page: Page,
    browser: Mutex<Option<Browser>>,
    alive: Arc<AtomicBool>,
}

impl BrowserPage {
    fn ensure_alive(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrowserError::SessionClosed(
                "browser handler exited".to_string(),
            ))
        }
    }

    fn map_cdp(&self, e: CdpError, fallback: fn(String) -> BrowserError) -> BrowserError {
        let msg = e.to_string();
        match e {
            CdpError::Timeout => BrowserError::Timeout(msg),
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                BrowserError::SessionClosed(msg)
            }
            _ if !self.alive.load(Ordering::SeqCst) => BrowserError::SessionClosed(msg),
            _ => fallback(msg),
        }
    }
}

fn selector_state_script(selector: &str, state: SelectorState) -> String {
    let selector = serde_json::Value::String(selector.to_string()).to_string();
    let state = match state {
        SelectorState::Attached => "attached",
        SelectorState::Visible => "visible",
        SelectorState::Hidden => "hidden",
        SelectorState::Detached => "detached",
    };
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    let visible = false;
    if (el) {{
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        visible = rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    }}
    switch ('{state}') {{
        case 'attached': return !!el;
        case 'visible': return visible;
        case 'hidden': return !visible;
        default: return !el;
    }}
}})()"#
    )
}

#[async_trait::async_trait]
impl PageDriver for BrowserPage {
    async fn navigate(&self, url: &str, wait: WaitMode, timeout: Duration) -> Result<()> {
        self.ensure_alive()?;
        let deadline = Instant::now() + timeout;

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.map_cdp(e, BrowserError::NavigationError)),
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} exceeded {timeout:?}"
                )))
            }
        }

        if wait == WaitMode::Load {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.evaluate(READY_COMPLETE)).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    return Err(BrowserError::Timeout(format!(
                        "load event for {url} exceeded {timeout:?}"
                    )))
                }
            }
        }

        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.ensure_alive()?;
        let result = self
            .page
            .evaluate_expression(script)
            .await
            .map_err(|e| self.map_cdp(e, BrowserError::ScriptError))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn query_selector(&self, selector: &str) -> Result<bool> {
        self.ensure_alive()?;
        match self.page.find_element(selector).await {
            Ok(_) => Ok(true),
            Err(e) => match self.map_cdp(e, BrowserError::SelectorNotFound) {
                BrowserError::SelectorNotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: SelectorState,
        timeout: Duration,
    ) -> Result<bool> {
        let script = selector_state_script(selector, state);
        let deadline = Instant::now() + timeout;

        loop {
            if self.evaluate(&script).await?.as_bool().unwrap_or(false) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_alive()?;
        self.page
            .url()
            .await
            .map_err(|e| self.map_cdp(e, BrowserError::NavigationError))?
            .ok_or_else(|| BrowserError::NavigationError("page has no URL".to_string()))
    }

    async fn content(&self) -> Result<String> {
        self.ensure_alive()?;
        self.page
            .content()
            .await
            .map_err(|e| self.map_cdp(e, BrowserError::ScriptError))
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let count = self.evaluate(RESOURCE_COUNT).await?.as_u64();
            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= IDLE_WINDOW {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "network not idle within {timeout:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!("browser wait failed: {}", e);
        }
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}
