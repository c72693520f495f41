//! Rendering collaborators for the crawler.
//!
//! Every crawl session drives one [`PageDriver`]. Two implementations ship:
//! [`BrowserPage`], a headless Chromium page over CDP, and [`StaticPage`],
//! a plain HTTP fetcher for sites that render server-side.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod scripts;
pub mod static_page;

pub use actions::{absolutize, PageDriver, SelectorState, WaitMode};
pub use engine::{BrowserEngine, BrowserPage};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use scripts::PageScripts;
pub use static_page::StaticPage;

use prowl_core::{BrowserConfig, BrowserKind};

/// Open a fresh rendering session of the configured kind
pub async fn open_driver(config: &BrowserConfig) -> Result<Box<dyn PageDriver>> {
    match config.engine {
        BrowserKind::Chromium => {
            let engine = BrowserEngine::launch(config).await?;
            Ok(Box::new(engine.into_page().await?))
        }
        BrowserKind::Static => {
            let fingerprint = FingerprintConfig::from_config(config);
            Ok(Box::new(StaticPage::new(&fingerprint)?))
        }
    }
}
