use std::sync::Arc;

use async_trait::async_trait;
use conflux_error::ConfluxResult;

use crate::{Fragment, FragmentRequest, FragmentStats};

/// Lists the fragments of an external data source.
///
/// A source instance is built for a single request and is not reused across attempts.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Returns all fragments of `path`. The returned indices are reassigned by the caller.
    async fn list(&self, path: &str) -> ConfluxResult<Vec<Fragment>>;

    /// Returns size statistics over the fragments of `path`.
    async fn stats(&self, path: &str) -> ConfluxResult<FragmentStats>;
}

/// Builds a fresh [`FragmentSource`] for a request.
pub trait FragmentSourceFactory: Send + Sync {
    fn create(&self, request: &FragmentRequest) -> ConfluxResult<Arc<dyn FragmentSource>>;
}

impl<F> FragmentSourceFactory for F
where
    F: Fn(&FragmentRequest) -> ConfluxResult<Arc<dyn FragmentSource>> + Send + Sync,
{
    fn create(&self, request: &FragmentRequest) -> ConfluxResult<Arc<dyn FragmentSource>> {
        self(request)
    }
}
