use std::sync::Arc;

use conflux_error::ConfluxResult;
use conflux_fragment::{
    Fragment, FragmentList, FragmentService, FragmentSourceFactory, FragmentStats,
};
use conflux_identity::{Clock, IdentityCache, IdentityProvider};
use conflux_metrics::ConfluxMetrics;
use conflux_record::{RecordCodec, RecordEncoder};

use crate::{GatewayConfig, RequestContext};

/// The composition root: owns the process-wide caches and hands them to request handlers.
pub struct Gateway<P: IdentityProvider> {
    config: GatewayConfig,
    metrics: Arc<ConfluxMetrics>,
    fragments: FragmentService,
    identities: IdentityCache<P>,
    codec: Option<Arc<dyn RecordCodec>>,
}

impl<P: IdentityProvider> Gateway<P> {
    pub fn new(
        config: GatewayConfig,
        sources: Arc<dyn FragmentSourceFactory>,
        provider: P,
    ) -> Self {
        let metrics = Arc::new(config.metrics());
        let fragments = FragmentService::new(sources, config.fragment_options(), &metrics);
        let identities = IdentityCache::new(provider, config.identity_options(), &metrics);
        log::debug!(
            "Gateway started, identity ttl {}s, fragment ttl {}s",
            config.identity_ttl.as_secs(),
            config.fragment_cache_ttl.as_secs()
        );
        Self {
            config,
            metrics,
            fragments,
            identities,
            codec: None,
        }
    }

    /// The codec used for binary output. Requests asking for binary output fail without one.
    pub fn with_codec(mut self, codec: Arc<dyn RecordCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_identity_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.identities = self.identities.with_clock(clock);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ConfluxMetrics> {
        &self.metrics
    }

    pub fn fragment_service(&self) -> &FragmentService {
        &self.fragments
    }

    pub fn identities(&self) -> &IdentityCache<P> {
        &self.identities
    }

    /// All fragments of the scan the request belongs to.
    pub async fn fragments(&self, ctx: &RequestContext) -> ConfluxResult<FragmentList> {
        self.fragments.fragments(&ctx.fragment_request()).await
    }

    /// The fragments the requesting segment should read.
    pub async fn fragments_for_segment(
        &self,
        ctx: &RequestContext,
    ) -> ConfluxResult<Vec<Fragment>> {
        self.fragments
            .fragments_for_segment(&ctx.fragment_request())
            .await
    }

    pub async fn stats(&self, ctx: &RequestContext) -> ConfluxResult<FragmentStats> {
        self.fragments.stats(&ctx.fragment_request()).await
    }

    /// A fresh encoder for the request's output mode and schema.
    pub fn encoder(&self, ctx: &RequestContext) -> ConfluxResult<RecordEncoder> {
        RecordEncoder::new(
            ctx.columns.clone(),
            ctx.encoder_options(),
            self.codec.as_deref(),
        )
    }
}
