//! Process-local counters surfaced through logs and the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    static_cache_hits: AtomicU64,
    static_cache_misses: AtomicU64,
    media_cache_hits: AtomicU64,
    pass_throughs: AtomicU64,
    offline_substitutes: AtomicU64,
    downloads_started: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn static_cache_hit(&self) {
        self.static_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn static_cache_miss(&self) {
        self.static_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn media_cache_hit(&self) {
        self.media_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pass_through(&self) {
        self.pass_throughs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn offline_substitute(&self) {
        self.offline_substitutes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn download_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            static_cache_hits: self.static_cache_hits.load(Ordering::Relaxed),
            static_cache_misses: self.static_cache_misses.load(Ordering::Relaxed),
            media_cache_hits: self.media_cache_hits.load(Ordering::Relaxed),
            pass_throughs: self.pass_throughs.load(Ordering::Relaxed),
            offline_substitutes: self.offline_substitutes.load(Ordering::Relaxed),
            downloads_started: self.downloads_started.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub static_cache_hits: u64,
    pub static_cache_misses: u64,
    pub media_cache_hits: u64,
    pub pass_throughs: u64,
    pub offline_substitutes: u64,
    pub downloads_started: u64,
}
