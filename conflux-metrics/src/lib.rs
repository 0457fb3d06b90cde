#![deny(missing_docs)]
//! Conflux metrics
//!
//! A thin registry shared by the gateway caches. Each component resolves its counters once at
//! construction and increments them lock-free afterwards.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use witchcraft_metrics::{Metric, MetricRegistry, Metrics, MetricsIter};

// re-export exposed metric types
pub use witchcraft_metrics::{Counter, Histogram, MetricId, Timer};

/// Well-known metric names emitted by the gateway components.
pub mod names {
    /// Fragment lists served from the cache without computing.
    pub const FRAGMENT_CACHE_HITS: &str = "conflux.fragments.cache.hits";
    /// Fragment lists that had to be computed or awaited.
    pub const FRAGMENT_CACHE_MISSES: &str = "conflux.fragments.cache.misses";
    /// Fragment list computations actually started.
    pub const FRAGMENT_COMPUTATIONS: &str = "conflux.fragments.computations";
    /// Fragment list computations that failed.
    pub const FRAGMENT_FAILURES: &str = "conflux.fragments.failures";
    /// Security negotiation retries while listing fragments.
    pub const FRAGMENT_RETRIES: &str = "conflux.fragments.retries";
    /// Time spent computing fragment lists.
    pub const FRAGMENT_COMPUTE_TIME: &str = "conflux.fragments.compute";
    /// Identities created by the provider.
    pub const IDENTITY_CREATED: &str = "conflux.identity.created";
    /// Identities destroyed, successfully or not.
    pub const IDENTITY_DESTROYED: &str = "conflux.identity.destroyed";
    /// Identity destroy calls that failed and were swallowed.
    pub const IDENTITY_DESTROY_FAILURES: &str = "conflux.identity.destroy_failures";
    /// Expired identities put back because they were still referenced.
    pub const IDENTITY_RESCHEDULED: &str = "conflux.identity.rescheduled";
}

/// A metric registry for the gateway's caches.
#[derive(Default)]
pub struct ConfluxMetrics {
    registry: MetricRegistry,
    default_tags: DefaultTags,
}

/// Default tags for metrics used in [`ConfluxMetrics`].
#[derive(Default)]
pub struct DefaultTags(BTreeMap<Cow<'static, str>, Cow<'static, str>>);

impl<K, V> From<&[(K, V)]> for DefaultTags
where
    K: Clone + Into<Cow<'static, str>>,
    V: Clone + Into<Cow<'static, str>>,
{
    fn from(pairs: &[(K, V)]) -> Self {
        DefaultTags(
            pairs
                .iter()
                .map(|(k, v)| (k.clone().into(), v.clone().into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for DefaultTags {
    fn from(tags: BTreeMap<String, String>) -> Self {
        DefaultTags(
            tags.into_iter()
                .map(|(k, v)| (Cow::Owned(k), Cow::Owned(v)))
                .collect(),
        )
    }
}

impl ConfluxMetrics {
    /// Create a new [`ConfluxMetrics`] instance.
    pub fn new(registry: MetricRegistry, default_tags: impl Into<DefaultTags>) -> Self {
        Self {
            registry,
            default_tags: default_tags.into(),
        }
    }

    /// Create an empty metric registry with default tags.
    pub fn default_with_tags(default_tags: impl Into<DefaultTags>) -> Self {
        Self {
            registry: MetricRegistry::default(),
            default_tags: default_tags.into(),
        }
    }

    /// Returns the counter with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a counter.
    pub fn counter<T>(&self, id: T) -> Arc<Counter>
    where
        T: Into<MetricId>,
    {
        self.registry.counter(id)
    }

    /// Returns the timer with the specified ID, creating a default instance if absent.
    ///
    /// # Panics
    ///
    /// Panics if a metric is registered with the ID that is not a timer.
    pub fn timer<T>(&self, id: T) -> Arc<Timer>
    where
        T: Into<MetricId>,
    {
        self.registry.timer(id)
    }

    /// Current value of a counter, zero if it was never registered.
    pub fn counter_value(&self, name: &'static str) -> i64 {
        self.registry.counter(name).count()
    }

    /// Returns a snapshot of the metrics in the registry.
    ///
    /// Modifications to the registry after this method is called will not affect the state of the returned `MetricsSnapshot`.
    pub fn metrics(&self) -> MetricsSnapshot<'_> {
        MetricsSnapshot {
            snapshot: self.registry.metrics(),
            default_tags: &self.default_tags,
        }
    }
}

/// A snapshot of the metrics in a registry with default tags.
pub struct MetricsSnapshot<'a> {
    snapshot: Metrics,
    default_tags: &'a DefaultTags,
}

impl MetricsSnapshot<'_> {
    /// Create an iterator over the metrics snapshot.
    pub fn iter(&self) -> ConfluxMetricsIter<'_> {
        ConfluxMetricsIter {
            iter: self.snapshot.iter(),
            default_tags: self.default_tags,
        }
    }
}

/// Metrics Iterator that applies the default tags to each metric in the inner iterator.
pub struct ConfluxMetricsIter<'a> {
    iter: MetricsIter<'a>,
    default_tags: &'a DefaultTags,
}

impl<'a> Iterator for ConfluxMetricsIter<'a> {
    type Item = (MetricId, &'a Metric);

    #[inline]
    fn next(&mut self) -> Option<(MetricId, &'a Metric)> {
        self.iter.next().map(|(k, v)| {
            let mut metric_id = k.clone();
            for (tag_key, tag_value) in self.default_tags.0.iter() {
                metric_id = metric_id.with_tag(tag_key.clone(), tag_value.clone())
            }

            (metric_id, v)
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
