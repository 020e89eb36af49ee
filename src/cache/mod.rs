//! Time- and capacity-bounded cache for canonical figure lists.
//!
//! Entries are keyed by document id and visible only until they expire.
//! Expired entries are purged lazily on lookup; capacity overflow evicts the
//! oldest-inserted entry regardless of its remaining TTL. Stored and returned
//! lists are cloned so callers can never mutate cached state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::Figure;

/// Configuration for [`FigureCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Time entries stay visible after insertion.
    pub ttl: Duration,

    /// Maximum number of cached documents.
    pub capacity: usize,
}

impl CacheConfig {
    /// Create a config with the given TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create a config with the given capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            capacity: 100,
        }
    }
}

/// Hit/miss counters and entry count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries (including not-yet-purged expired ones).
    pub entries: usize,
    /// Fraction of lookups that hit, `0.0` when no lookups happened.
    pub hit_rate: f64,
    /// Fraction of lookups that missed.
    pub miss_rate: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    figures: Vec<Figure>,
    inserted_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Per-document figure cache with TTL and insertion-order eviction.
#[derive(Debug)]
pub struct FigureCache {
    entries: HashMap<String, CacheEntry>,
    config: CacheConfig,
    hits: u64,
    misses: u64,
}

impl FigureCache {
    /// Create a cache with default TTL (60 s) and capacity (100 documents).
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache with explicit configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a document's figures. Expired entries count as absent and are
    /// deleted as a side effect. Returns a clone of the cached list.
    pub fn get(&mut self, doc_id: &str) -> Option<Vec<Figure>> {
        let now = Instant::now();
        match self.entries.get(doc_id) {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove(doc_id);
                self.misses += 1;
                None
            }
            Some(entry) => {
                self.hits += 1;
                Some(entry.figures.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a document's figures. `ttl` overrides the configured default.
    /// At capacity, the entry with the smallest insertion timestamp is
    /// evicted first, independent of TTL.
    pub fn set(&mut self, doc_id: &str, figures: &[Figure], ttl: Option<Duration>) {
        if !self.entries.contains_key(doc_id) && self.entries.len() >= self.config.capacity {
            self.evict_oldest();
        }

        let now = Instant::now();
        let entry = CacheEntry {
            figures: figures.to_vec(),
            inserted_at: now,
            expires_at: now + ttl.unwrap_or(self.config.ttl),
        };
        debug!("cache: storing {} figure(s) for {doc_id}", figures.len());
        self.entries.insert(doc_id.to_string(), entry);
    }

    /// Whether a live (non-expired) entry exists. Expired entries are
    /// removed as a side effect; counters are not touched.
    pub fn contains(&mut self, doc_id: &str) -> bool {
        let now = Instant::now();
        match self.entries.get(doc_id) {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove(doc_id);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drop one document's entry, or every entry (and the counters) when
    /// `doc_id` is `None`.
    pub fn clear(&mut self, doc_id: Option<&str>) {
        match doc_id {
            Some(id) => {
                self.entries.remove(id);
            }
            None => {
                self.entries.clear();
                self.hits = 0;
                self.misses = 0;
            }
        }
    }

    /// Remove every expired entry eagerly. Returns how many were purged.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!("cache: purged {purged} expired entrie(s)");
        }
        purged
    }

    /// Entry count plus hit/miss rates.
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        let (hit_rate, miss_rate) = if lookups > 0 {
            (
                self.hits as f64 / lookups as f64,
                self.misses as f64 / lookups as f64,
            )
        } else {
            (0.0, 0.0)
        };
        CacheStats {
            entries: self.entries.len(),
            hit_rate,
            miss_rate,
        }
    }

    /// Rough byte estimate of cached content, for memory accounting.
    pub fn estimated_size(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, entry)| {
                key.len()
                    + entry
                        .figures
                        .iter()
                        .map(|f| {
                            f.id.len()
                                + f.content.len()
                                + f.caption.len()
                                + f.caption_id.len()
                                + f.summary.len()
                        })
                        .sum::<usize>()
            })
            .sum()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!("cache: evicting oldest entry {key}");
            self.entries.remove(&key);
        }
    }
}

impl Default for FigureCache {
    fn default() -> Self {
        Self::new()
    }
}
