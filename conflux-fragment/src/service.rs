use std::sync::Arc;
use std::time::{Duration, Instant};

use conflux_error::ConfluxResult;
use conflux_metrics::{ConfluxMetrics, Counter, Timer, names};

use crate::{
    Fragment, FragmentCache, FragmentCacheKey, FragmentList, FragmentSourceFactory, FragmentStats,
    SecurityRetry, distribute,
};

/// What a segment asks for when it wants its share of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentRequest {
    pub user: String,
    pub server_name: String,
    pub transaction_id: String,
    pub schema_name: String,
    pub table_name: String,
    /// Path of the data source, as understood by the fragment source.
    pub data_source: String,
    pub filter_string: Option<String>,
    pub profile: Option<String>,
    pub segment_id: u32,
    pub total_segments: u32,
    pub gp_session_id: i64,
    pub gp_command_count: i64,
    /// Treat a missing data source as an empty one.
    pub ignore_missing_path: bool,
}

impl FragmentRequest {
    pub fn cache_key(&self) -> FragmentCacheKey {
        FragmentCacheKey::new(
            &self.server_name,
            &self.transaction_id,
            &self.schema_name,
            &self.table_name,
            &self.data_source,
            self.filter_string.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentServiceOptions {
    /// Fragment lists not read for this long are evicted.
    pub idle_ttl: Duration,
    pub security_retries: u32,
    pub security_enabled: bool,
}

impl Default for FragmentServiceOptions {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(10),
            security_retries: 2,
            security_enabled: false,
        }
    }
}

/// Lists, caches and distributes the fragments of external data sources.
pub struct FragmentService {
    cache: FragmentCache,
    lister: FragmentLister,
}

/// Everything a fragment computation needs, owned so that it can outlive the caller starting it.
#[derive(Clone)]
struct FragmentLister {
    factory: Arc<dyn FragmentSourceFactory>,
    retry: SecurityRetry,
    retries: Arc<Counter>,
    failures: Arc<Counter>,
    compute_time: Arc<Timer>,
}

impl FragmentService {
    pub fn new(
        factory: Arc<dyn FragmentSourceFactory>,
        options: FragmentServiceOptions,
        metrics: &ConfluxMetrics,
    ) -> Self {
        Self {
            cache: FragmentCache::new(options.idle_ttl, metrics),
            lister: FragmentLister {
                factory,
                retry: SecurityRetry::new(options.security_enabled, options.security_retries),
                retries: metrics.counter(names::FRAGMENT_RETRIES),
                failures: metrics.counter(names::FRAGMENT_FAILURES),
                compute_time: metrics.timer(names::FRAGMENT_COMPUTE_TIME),
            },
        }
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    /// All fragments of the request's data source, computed at most once per query and filter.
    pub async fn fragments(&self, request: &FragmentRequest) -> ConfluxResult<FragmentList> {
        let key = request.cache_key();
        log::debug!(
            "Segment {} of {} looking up fragments for {}",
            request.segment_id,
            request.total_segments,
            key
        );
        let lister = self.lister.clone();
        let request = request.clone();
        self.cache
            .get_or_compute(&key, move || async move { lister.list(&request).await })
            .await
    }

    /// The fragments the requesting segment should read.
    pub async fn fragments_for_segment(
        &self,
        request: &FragmentRequest,
    ) -> ConfluxResult<Vec<Fragment>> {
        let fragments = self.fragments(request).await?;
        let assigned = distribute(
            &fragments,
            request.segment_id,
            request.total_segments,
            request.gp_session_id,
            request.gp_command_count,
        )?;
        log::debug!(
            "Segment {} assigned {} of {} fragments of {}",
            request.segment_id,
            assigned.len(),
            fragments.len(),
            request.data_source
        );
        Ok(assigned)
    }

    /// Size statistics of the request's data source. Never cached.
    pub async fn stats(&self, request: &FragmentRequest) -> ConfluxResult<FragmentStats> {
        let stats = self.lister.stats(request).await?;
        log::debug!("{}", stats.describe(&request.data_source));
        Ok(stats)
    }
}

impl FragmentLister {
    async fn stats(&self, request: &FragmentRequest) -> ConfluxResult<FragmentStats> {
        let factory = &self.factory;
        self.retry
            .execute_with_callback(
                move || async move {
                    let source = factory.create(request)?;
                    source.stats(&request.data_source).await
                },
                || {
                    self.retries.inc();
                    Ok(())
                },
            )
            .await
    }

    async fn list(&self, request: &FragmentRequest) -> ConfluxResult<Vec<Fragment>> {
        let started = Instant::now();
        let factory = &self.factory;
        let listed = self
            .retry
            .execute_with_callback(
                move || async move {
                    let source = factory.create(request)?;
                    source.list(&request.data_source).await
                },
                || {
                    self.retries.inc();
                    Ok(())
                },
            )
            .await;

        let fragments = match listed {
            Ok(fragments) => fragments,
            Err(err) if request.ignore_missing_path && err.is_path_not_found() => {
                log::debug!(
                    "Ignoring missing path {} for user {}: {}",
                    request.data_source,
                    request.user,
                    err
                );
                Vec::new()
            }
            Err(err) => {
                self.failures.inc();
                return Err(err);
            }
        };

        let elapsed = started.elapsed();
        self.compute_time.update(elapsed);
        log::info!(
            "Returning {} fragment{} in {} ms for user {}, resource {}",
            fragments.len(),
            if fragments.len() == 1 { "" } else { "s" },
            elapsed.as_millis(),
            request.user,
            request.data_source
        );
        Ok(fragments)
    }
}
