//! Per-domain frontier: what has been seen, what is waiting, what was found.
//!
//! Pop order is FIFO, so a domain is explored breadth-first and the URL
//! budget is spent on shallow pages before deep ones.

use prowl_core::{CrawlStatus, Domain};
use prowl_rules::{Exclusion, Rulebook};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why `admit` did or did not enqueue a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Enqueued
    Admitted,
    /// Already visited or queued
    AlreadySeen,
    /// Matched an exclusion rule
    Excluded(Exclusion),
    /// Deeper than the depth bound
    TooDeep,
    /// The product budget is spent
    ProductLimit,
}

impl Admission {
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Bounds for one domain's frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    /// Deepest link distance from the entry URL that is still visited
    pub max_depth: u32,
    /// Bound on both visited pages and recorded products
    pub max_urls: usize,
    /// Soft wall-clock limit for the session
    pub time_limit: Option<Duration>,
}

/// Visited/queued bookkeeping for a single domain, owned by its session.
pub struct FrontierManager {
    domain: Domain,
    rules: Arc<Rulebook>,
    limits: FrontierLimits,
    started: Instant,
    pending: VecDeque<(String, u32)>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    products: HashSet<String>,
    refused_for_depth: usize,
}

impl FrontierManager {
    #[must_use]
    pub fn new(domain: Domain, rules: Arc<Rulebook>, limits: FrontierLimits) -> Self {
        Self {
            domain,
            rules,
            limits,
            started: Instant::now(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            products: HashSet::new(),
            refused_for_depth: 0,
        }
    }

    /// Offer a URL discovered at `depth`.
    pub fn admit(&mut self, url: &str, depth: u32) -> Admission {
        if self.visited.contains(url) || self.queued.contains(url) {
            return Admission::AlreadySeen;
        }
        if let Some(reason) = self.rules.exclusions.explain(url, &self.domain) {
            tracing::trace!(url, ?reason, "excluded");
            return Admission::Excluded(reason);
        }
        if depth > self.limits.max_depth {
            self.refused_for_depth += 1;
            return Admission::TooDeep;
        }
        if self.products.len() >= self.limits.max_urls {
            return Admission::ProductLimit;
        }

        self.queued.insert(url.to_string());
        self.pending.push_back((url.to_string(), depth));
        Admission::Admitted
    }

    /// Pop the next URL to visit and mark it visited.
    ///
    /// Returns `None` once the queue is empty or the visit budget is spent.
    pub fn next(&mut self) -> Option<(String, u32)> {
        if self.visited.len() >= self.limits.max_urls {
            return None;
        }
        let (url, depth) = self.pending.pop_front()?;
        self.queued.remove(&url);
        self.visited.insert(url.clone());
        Some((url, depth))
    }

    /// Record a product URL. Returns whether it was new.
    pub fn record_product(&mut self, url: &str) -> bool {
        self.products.insert(url.to_string())
    }

    /// Why the session should stop, if it should.
    #[must_use]
    pub fn termination(&self) -> Option<CrawlStatus> {
        if self.visited.len() >= self.limits.max_urls {
            return Some(CrawlStatus::UrlLimitReached);
        }
        if let Some(limit) = self.limits.time_limit {
            if self.started.elapsed() >= limit {
                return Some(CrawlStatus::TimedOut);
            }
        }
        if self.pending.is_empty() {
            return Some(if self.refused_for_depth > 0 {
                CrawlStatus::DepthExhausted
            } else {
                CrawlStatus::Completed
            });
        }
        None
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier(max_depth: u32, max_urls: usize) -> FrontierManager {
        FrontierManager::new(
            Domain::parse("shop.example").unwrap(),
            Arc::new(Rulebook::builtin().unwrap()),
            FrontierLimits {
                max_depth,
                max_urls,
                time_limit: None,
            },
        )
    }

    #[test]
    fn test_fifo_and_visited_once() {
        let mut f = frontier(3, 10);
        assert!(f.admit("https://shop.example/", 0).is_admitted());
        assert!(f.admit("https://shop.example/c/a", 1).is_admitted());
        assert_eq!(f.admit("https://shop.example/c/a", 1), Admission::AlreadySeen);

        assert_eq!(f.next().unwrap().0, "https://shop.example/");
        assert_eq!(f.admit("https://shop.example/", 2), Admission::AlreadySeen);
        assert_eq!(f.next().unwrap(), ("https://shop.example/c/a".to_string(), 1));
        assert!(f.next().is_none());
        assert_eq!(f.termination(), Some(CrawlStatus::Completed));
    }

    #[test]
    fn test_exclusions_and_foreign_hosts() {
        let mut f = frontier(3, 10);
        assert!(matches!(
            f.admit("https://shop.example/about-us", 1),
            Admission::Excluded(Exclusion::GlobalRule(_))
        ));
        assert_eq!(
            f.admit("https://other.example/p/kettle", 1),
            Admission::Excluded(Exclusion::DomainMismatch)
        );
        assert_eq!(f.pending_count(), 0);
    }

    #[test]
    fn test_depth_bound() {
        let mut f = frontier(1, 10);
        assert!(f.admit("https://shop.example/c/a", 1).is_admitted());
        assert_eq!(f.admit("https://shop.example/c/b", 2), Admission::TooDeep);
        f.next();
        assert_eq!(f.termination(), Some(CrawlStatus::DepthExhausted));
    }

    #[test]
    fn test_visit_budget() {
        let mut f = frontier(3, 2);
        for i in 0..5 {
            f.admit(&format!("https://shop.example/c/{i}"), 1);
        }
        assert!(f.next().is_some());
        assert!(f.next().is_some());
        assert!(f.next().is_none());
        assert_eq!(f.visited_count(), 2);
        assert_eq!(f.termination(), Some(CrawlStatus::UrlLimitReached));
    }

    #[test]
    fn test_product_budget_and_idempotent_record() {
        let mut f = frontier(3, 2);
        assert!(f.record_product("https://shop.example/p/1"));
        assert!(!f.record_product("https://shop.example/p/1"));
        assert!(f.record_product("https://shop.example/p/2"));
        assert_eq!(f.product_count(), 2);
        assert_eq!(f.admit("https://shop.example/c/x", 1), Admission::ProductLimit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit() {
        let mut f = FrontierManager::new(
            Domain::parse("shop.example").unwrap(),
            Arc::new(Rulebook::builtin().unwrap()),
            FrontierLimits {
                max_depth: 3,
                max_urls: 10,
                time_limit: Some(Duration::from_secs(60)),
            },
        );
        f.admit("https://shop.example/c/a", 1);
        assert_eq!(f.termination(), None);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(f.termination(), Some(CrawlStatus::TimedOut));
    }
}
