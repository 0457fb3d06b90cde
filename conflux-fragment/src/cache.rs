use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use conflux_error::{ConfluxResult, SharedConfluxResult, SharedResultExt};
use conflux_metrics::{ConfluxMetrics, Counter, names};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moka::future::Cache;
use moka::ops::compute::Op;
use rustc_hash::FxBuildHasher;

use crate::{Fragment, FragmentCacheKey, renumber_fragments};

/// A computed fragment list, shared by every segment of the query that produced it.
pub type FragmentList = Arc<Vec<Fragment>>;

/// A fragment computation, polled by whichever callers are currently waiting on it.
type PendingFragments = Shared<BoxFuture<'static, SharedConfluxResult<FragmentList>>>;

/// Single-flight cache of fragment lists.
///
/// The first caller for a key starts the computation; concurrent callers for the same key wait for
/// it and receive the same [`FragmentList`], or the same error. The computation does not belong to
/// the caller that started it: a caller that goes away leaves it to the remaining and later
/// callers. Failed computations are never cached. Entries are evicted once they have not been read
/// for the idle TTL.
pub struct FragmentCache {
    entries: Cache<FragmentCacheKey, PendingFragments, FxBuildHasher>,
    hits: Arc<Counter>,
    misses: Arc<Counter>,
    computations: Arc<Counter>,
}

impl FragmentCache {
    pub fn new(idle_ttl: Duration, metrics: &ConfluxMetrics) -> Self {
        let entries = Cache::builder()
            .name("conflux-fragment-cache")
            .time_to_idle(idle_ttl)
            .eviction_listener(|key: Arc<FragmentCacheKey>, _fragments, cause| {
                log::trace!("Removed fragments of {} due to {:?}", key, cause);
            })
            .build_with_hasher(FxBuildHasher);

        Self {
            entries,
            hits: metrics.counter(names::FRAGMENT_CACHE_HITS),
            misses: metrics.counter(names::FRAGMENT_CACHE_MISSES),
            computations: metrics.counter(names::FRAGMENT_COMPUTATIONS),
        }
    }

    /// Returns the fragments cached under `key`, running `compute` if there are none.
    ///
    /// `compute` is only called by the caller that installs the entry. Indices of the computed
    /// fragments are renumbered per source name before they are published.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &FragmentCacheKey,
        compute: F,
    ) -> ConfluxResult<FragmentList>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = ConfluxResult<Vec<Fragment>>> + Send + 'static,
    {
        let computations = self.computations.clone();
        let entry = self
            .entries
            .entry_by_ref(key)
            .or_insert_with(async move {
                let listing = compute();
                async move {
                    computations.inc();
                    let mut fragments = listing.await.map_err(Arc::new)?;
                    renumber_fragments(&mut fragments);
                    SharedConfluxResult::Ok(Arc::new(fragments))
                }
                .boxed()
                .shared()
            })
            .await;

        if entry.is_fresh() {
            self.misses.inc();
        } else {
            self.hits.inc();
        }

        let pending = entry.into_value();
        let result = pending.clone().await;
        if let Err(err) = &result {
            log::debug!("Fragment computation for {key} failed, not caching: {err}");
            self.forget(key, &pending).await;
        }
        drop(pending);
        result.unshare()
    }

    /// Returns the cached fragments for `key` without computing them.
    pub async fn get(&self, key: &FragmentCacheKey) -> Option<FragmentList> {
        let pending = self.entries.get(key).await?;
        pending.peek().and_then(|result| result.as_ref().ok().cloned())
    }

    /// Whether `key` has fragments cached or being computed.
    pub fn contains(&self, key: &FragmentCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub async fn invalidate(&self, key: &FragmentCacheKey) {
        self.entries.invalidate(key).await;
    }

    /// Number of cached fragment lists, after applying pending evictions.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops a failed computation, unless a newer one already took its place.
    async fn forget(&self, key: &FragmentCacheKey, failed: &PendingFragments) {
        let _ = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let stale = current.is_some_and(|entry| entry.value().ptr_eq(failed));
                std::future::ready(if stale { Op::Remove } else { Op::Nop })
            })
            .await;
    }
}
