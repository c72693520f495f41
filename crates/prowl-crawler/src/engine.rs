//! Runs every configured domain concurrently under one batch deadline.

use crate::gate::CaptchaResolver;
use crate::orchestrator::{
    BrowserSessions, CrawlContext, DomainOrchestrator, DomainReport, SessionFactory,
};
use crate::store::ResultStore;
use prowl_core::{AppConfig, CrawlStatus};
use prowl_rules::Rulebook;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Bound on shutting a rendering session down once its crawl has ended.
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Multi-domain crawl: one task and one rendering session per domain.
pub struct CrawlEngine {
    config: AppConfig,
    rules: Arc<Rulebook>,
    sessions: Arc<dyn SessionFactory>,
    resolver: Option<Arc<dyn CaptchaResolver>>,
    store: ResultStore,
}

impl CrawlEngine {
    /// Engine opening sessions with the configured browser.
    ///
    /// A host listed more than once is crawled by a single session.
    #[must_use]
    pub fn new(mut config: AppConfig, rules: Arc<Rulebook>) -> Self {
        let mut seen = HashSet::new();
        config.crawl.domains.retain(|domain| {
            let first = seen.insert(domain.as_str().to_string());
            if !first {
                warn!(domain = %domain, "duplicate domain ignored");
            }
            first
        });
        let sessions = Arc::new(BrowserSessions::new(config.browser.clone()));
        let store = ResultStore::new(&config.crawl.domains);
        Self {
            config,
            rules,
            sessions,
            resolver: None,
            store,
        }
    }

    /// Replace the session factory.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replace the CAPTCHA resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CaptchaResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Results gathered so far. Shards stay readable after `run` returns.
    #[must_use]
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Crawl every domain until each finishes, the global timeout elapses or
    /// `shutdown` fires.
    ///
    /// Cancellation is cooperative: running sessions stop at their next
    /// suspension point and report `TimedOut`. Nothing recorded is lost.
    pub async fn run(&self, shutdown: &CancellationToken) -> Vec<DomainReport> {
        let mut ctx = CrawlContext::from_config(&self.config, Arc::clone(&self.rules));
        if let Some(resolver) = &self.resolver {
            ctx = ctx.with_resolver(Arc::clone(resolver));
        }
        let ctx = Arc::new(ctx);

        let cancel = shutdown.child_token();
        let mut tasks = JoinSet::new();

        for domain in &self.config.crawl.domains {
            let Some(writer) = self.store.writer(domain) else {
                warn!(domain = %domain, "no result shard, skipping");
                continue;
            };
            let orchestrator = DomainOrchestrator::new(domain.clone(), Arc::clone(&ctx), writer);
            let span = info_span!(
                "domain",
                domain = %domain,
                session_id = %orchestrator.session_id()
            );
            let sessions = Arc::clone(&self.sessions);
            let cancel = cancel.clone();
            tasks.spawn(run_session(orchestrator, sessions, cancel).instrument(span));
        }

        let timeout = self.config.crawl.global_timeout();
        let watchdog = tokio::spawn(watchdog(timeout, cancel.clone()));

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("domain task failed: {}", e),
            }
        }
        watchdog.abort();

        info!(
            domains = reports.len(),
            products = reports.iter().map(|r| r.products).sum::<usize>(),
            "crawl batch finished"
        );
        reports
    }
}

async fn watchdog(timeout: Duration, cancel: CancellationToken) {
    tokio::select! {
        () = tokio::time::sleep(timeout) => {
            warn!(?timeout, "global timeout reached, cancelling remaining domains");
            cancel.cancel();
        }
        () = cancel.cancelled() => {}
    }
}

async fn run_session(
    mut orchestrator: DomainOrchestrator,
    sessions: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
) -> DomainReport {
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return orchestrator.report(CrawlStatus::TimedOut, Duration::ZERO),
        opened = sessions.open(orchestrator.domain()) => opened,
    };
    let page = match opened {
        Ok(page) => page,
        Err(e) => {
            error!("could not open session: {}", e);
            return orchestrator.report(CrawlStatus::Failed, Duration::ZERO);
        }
    };

    let report = orchestrator.run(page.as_ref(), &cancel).await;
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, page.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("closing session failed: {}", e),
        Err(_) => warn!("session did not close within {:?}", SESSION_CLOSE_TIMEOUT),
    }
    report
}
