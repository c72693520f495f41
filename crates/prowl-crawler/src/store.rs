//! Product URLs found per domain, and their JSON export.
//!
//! The domain map is built once before crawling starts and never changes
//! shape. Each shard has exactly one writer, the session crawling that
//! domain, and only grows.

use crate::error::Result;
use prowl_core::{Domain, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug, Default)]
struct Shard {
    urls: Vec<String>,
    seen: HashSet<String>,
}

/// Exported results for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainResults {
    /// Product URLs in discovery order
    pub urls: Vec<String>,
    /// Number of URLs
    pub count: usize,
    /// RFC 3339 export time
    pub timestamp: String,
}

/// Append-only writer for one domain's shard.
#[derive(Debug, Clone)]
pub struct ShardWriter {
    domain: String,
    shard: Arc<RwLock<Shard>>,
}

impl ShardWriter {
    /// Append a product URL. Returns whether it was new.
    pub fn record(&self, url: &str) -> bool {
        let mut shard = self.shard.write().expect("acquire shard lock");
        if !shard.seen.insert(url.to_string()) {
            return false;
        }
        shard.urls.push(url.to_string());
        tracing::debug!(domain = %self.domain, url, total = shard.urls.len(), "recorded product");
        true
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Sharded product URL store.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    shards: Arc<HashMap<String, Arc<RwLock<Shard>>>>,
}

impl ResultStore {
    /// Store with one empty shard per domain.
    #[must_use]
    pub fn new(domains: &[Domain]) -> Self {
        let shards = domains
            .iter()
            .map(|d| (d.as_str().to_string(), Arc::new(RwLock::new(Shard::default()))))
            .collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    /// Writer for `domain`'s shard, if the domain was registered.
    #[must_use]
    pub fn writer(&self, domain: &Domain) -> Option<ShardWriter> {
        self.shards.get(domain.as_str()).map(|shard| ShardWriter {
            domain: domain.as_str().to_string(),
            shard: Arc::clone(shard),
        })
    }

    /// Product URLs recorded for `domain`, in discovery order.
    #[must_use]
    pub fn urls(&self, domain: &Domain) -> Vec<String> {
        self.shards
            .get(domain.as_str())
            .map(|shard| shard.read().expect("acquire shard lock").urls.clone())
            .unwrap_or_default()
    }

    /// Number of product URLs recorded for `domain`.
    #[must_use]
    pub fn count(&self, domain: &Domain) -> usize {
        self.shards
            .get(domain.as_str())
            .map_or(0, |shard| shard.read().expect("acquire shard lock").urls.len())
    }

    /// Point-in-time copy of every shard, keyed by domain.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, DomainResults> {
        let timestamp = Timestamp::now().to_rfc3339();
        self.shards
            .iter()
            .map(|(domain, shard)| {
                let urls = shard.read().expect("acquire shard lock").urls.clone();
                let results = DomainResults {
                    count: urls.len(),
                    urls,
                    timestamp: timestamp.clone(),
                };
                (domain.clone(), results)
            })
            .collect()
    }

    /// Pretty-printed JSON of [`snapshot`](Self::snapshot).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Write the JSON export to `path`, creating parent directories.
    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;

        let total: usize = self.snapshot().values().map(|r| r.count).sum();
        info!(path = %path.display(), domains = self.shards.len(), total, "exported results");
        Ok(())
    }
}
