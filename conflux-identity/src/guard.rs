use conflux_error::ConfluxResult;

use crate::{IdentityCache, IdentityProvider, SessionKey};

/// Holds one reference on a cached identity and gives it back when dropped.
pub struct IdentityGuard<'a, P: IdentityProvider> {
    cache: &'a IdentityCache<P>,
    key: SessionKey,
    identity: P::Identity,
    clean_on_release: bool,
    released: bool,
}

impl<'a, P: IdentityProvider> IdentityGuard<'a, P> {
    pub(crate) fn new(cache: &'a IdentityCache<P>, key: SessionKey, identity: P::Identity) -> Self {
        Self {
            cache,
            key,
            identity,
            clean_on_release: false,
            released: false,
        }
    }

    pub fn identity(&self) -> &P::Identity {
        &self.identity
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Destroy the identity on release if nothing else references it.
    pub fn set_clean_on_release(&mut self, clean: bool) {
        self.clean_on_release = clean;
    }

    /// Releases the reference now, surfacing any error instead of logging it.
    pub fn release(mut self) -> ConfluxResult<()> {
        self.released = true;
        self.cache.release(&self.key, self.clean_on_release)
    }
}

impl<P: IdentityProvider> Drop for IdentityGuard<'_, P> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.cache.release(&self.key, self.clean_on_release) {
            log::error!("Failed to release identity of {}: {}", self.key, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use conflux_error::conflux_bail;
    use conflux_metrics::ConfluxMetrics;

    use super::*;
    use crate::IdentityCacheOptions;

    #[derive(Default)]
    struct CountingProvider {
        destroyed: AtomicUsize,
    }

    impl IdentityProvider for CountingProvider {
        type Identity = String;

        fn login_identity(&self, server_name: &str) -> ConfluxResult<String> {
            Ok(format!("gateway@{server_name}"))
        }

        fn create_impersonated(&self, user: &str, login: &String) -> ConfluxResult<String> {
            Ok(format!("{user} via {login}"))
        }

        fn create_remote(
            &self,
            user: &str,
            _session: &SessionKey,
            _security_enabled: bool,
        ) -> ConfluxResult<String> {
            Ok(user.to_string())
        }

        fn destroy(&self, _identity: &String) -> ConfluxResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn cache() -> IdentityCache<CountingProvider> {
        IdentityCache::new(
            CountingProvider::default(),
            IdentityCacheOptions::default(),
            &ConfluxMetrics::default(),
        )
    }

    fn key() -> SessionKey {
        SessionKey::new("alice", 2, "XID-9", "default")
    }

    #[test]
    fn drop_releases_reference() {
        let cache = cache();
        {
            let guard = cache.acquire_guard(&key(), true).unwrap();
            assert_eq!(guard.identity(), "alice via gateway@default");
            assert_eq!(cache.ref_count(&key()), Some(1));
        }
        assert_eq!(cache.ref_count(&key()), Some(0));
        assert!(cache.contains(&key()));
    }

    #[test]
    fn clean_on_release_decided_late() {
        let cache = cache();
        let mut guard = cache.acquire_guard(&key(), false).unwrap();
        guard.set_clean_on_release(true);
        drop(guard);
        assert!(!cache.contains(&key()));
        assert_eq!(cache.provider().destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn releases_on_early_return() {
        fn work(cache: &IdentityCache<CountingProvider>) -> ConfluxResult<()> {
            let _guard = cache.acquire_guard(&key(), true)?;
            conflux_bail!(Computation: "reader failed");
        }

        let cache = cache();
        assert!(work(&cache).is_err());
        assert_eq!(cache.ref_count(&key()), Some(0));
    }

    #[test]
    fn explicit_release_surfaces_errors() {
        let cache = cache();
        let guard = cache.acquire_guard(&key(), true).unwrap();
        cache.release(&key(), false).unwrap();
        assert!(guard.release().unwrap_err().is_resource_state());
    }
}
