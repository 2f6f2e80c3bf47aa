//! In-memory caches
//!
//! These caches are volatile and cleared on restart.
//! Uses Moka for high-performance concurrent caching.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Ranking Cache
// =============================================================================

/// Last feed ordering returned by the recommendation service, per viewer
///
/// Used as the fallback when the ranking call fails.
pub struct RankingCache {
    /// Viewer ID -> bird IDs in ranked order
    orderings: Cache<String, Arc<Vec<String>>>,
}

impl RankingCache {
    /// Create new ranking cache
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of viewers to remember
    /// * `ttl` - How long an ordering stays usable
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let orderings = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { orderings }
    }

    pub async fn insert(&self, viewer_id: &str, ordering: Vec<String>) {
        self.orderings
            .insert(viewer_id.to_string(), Arc::new(ordering))
            .await;

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&["ranking"])
            .set(self.orderings.entry_count() as i64);
    }

    pub async fn get(&self, viewer_id: &str) -> Option<Arc<Vec<String>>> {
        let result = self.orderings.get(viewer_id).await;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["ranking"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["ranking"]).inc();
        }

        result
    }
}

/// Reorder `items` to follow `ordering`.
///
/// Items missing from the ordering keep their relative order and go last.
pub fn apply_ordering<T, F>(items: Vec<T>, ordering: &[String], key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let position = |item: &T| {
        ordering
            .iter()
            .position(|id| id == key(item))
            .unwrap_or(usize::MAX)
    };

    let mut indexed: Vec<(usize, usize, T)> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (position(&item), index, item))
        .collect();
    indexed.sort_by_key(|(rank, index, _)| (*rank, *index));
    indexed.into_iter().map(|(_, _, item)| item).collect()
}
