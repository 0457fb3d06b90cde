use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use conflux_error::{ConfluxResult, conflux_bail, conflux_err};
use conflux_metrics::{ConfluxMetrics, Counter, names};
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::{Clock, IdentityGuard, IdentityProvider, SessionKey, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCacheOptions {
    /// How long an identity survives without being released or acquired.
    pub ttl: Duration,
    /// Whether the deployment uses strong authentication.
    pub security_enabled: bool,
}

impl Default for IdentityCacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            security_enabled: false,
        }
    }
}

/// Orders the expiry queue. The sequence number tells apart entries with the same instant.
type Deadline = (Instant, u64);

struct Entry<I> {
    identity: I,
    ref_count: usize,
    deadline: Deadline,
}

/// The sessions of one segment with their expiry queue. Only ever touched under the segment lock.
struct SegmentSessions<I> {
    entries: FxHashMap<SessionKey, Entry<I>>,
    expiry: BTreeMap<Deadline, SessionKey>,
    next_seq: u64,
}

impl<I> Default for SegmentSessions<I> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            expiry: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<I> SegmentSessions<I> {
    fn next_deadline(&mut self, at: Instant) -> Deadline {
        let seq = self.next_seq;
        self.next_seq += 1;
        (at, seq)
    }

    fn insert(&mut self, key: SessionKey, identity: I, at: Instant) {
        let deadline = self.next_deadline(at);
        self.expiry.insert(deadline, key.clone());
        self.entries.insert(
            key,
            Entry {
                identity,
                ref_count: 1,
                deadline,
            },
        );
    }

    fn reschedule(&mut self, key: &SessionKey, at: Instant) {
        let deadline = self.next_deadline(at);
        if let Some(entry) = self.entries.get_mut(key) {
            self.expiry.remove(&entry.deadline);
            entry.deadline = deadline;
            self.expiry.insert(deadline, key.clone());
        }
    }

    fn remove(&mut self, key: &SessionKey) -> Option<Entry<I>> {
        let entry = self.entries.remove(key)?;
        self.expiry.remove(&entry.deadline);
        Some(entry)
    }

    /// Keys whose deadline is at or before `now`, earliest first.
    fn expired(&self, now: Instant) -> Vec<SessionKey> {
        self.expiry
            .range(..=(now, u64::MAX))
            .map(|(_, key)| key.clone())
            .collect()
    }
}

/// Reference-counted, expiring cache of identities, partitioned by segment.
///
/// [`acquire`](Self::acquire) and [`release`](Self::release) must be paired by the caller; use
/// [`acquire_guard`](Self::acquire_guard) to have the release happen on every exit path. Expired
/// entries are swept on every acquire and release of the same segment. An expired entry that is
/// still referenced is rescheduled rather than destroyed.
pub struct IdentityCache<P: IdentityProvider> {
    provider: P,
    options: IdentityCacheOptions,
    clock: Arc<dyn Clock>,
    segments: DashMap<u32, Arc<Mutex<SegmentSessions<P::Identity>>>, FxBuildHasher>,
    created: Arc<Counter>,
    destroyed: Arc<Counter>,
    destroy_failures: Arc<Counter>,
    rescheduled: Arc<Counter>,
}

impl<P: IdentityProvider> IdentityCache<P> {
    pub fn new(provider: P, options: IdentityCacheOptions, metrics: &ConfluxMetrics) -> Self {
        Self {
            provider,
            options,
            clock: Arc::new(SystemClock),
            segments: DashMap::default(),
            created: metrics.counter(names::IDENTITY_CREATED),
            destroyed: metrics.counter(names::IDENTITY_DESTROYED),
            destroy_failures: metrics.counter(names::IDENTITY_DESTROY_FAILURES),
            rescheduled: metrics.counter(names::IDENTITY_RESCHEDULED),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn options(&self) -> &IdentityCacheOptions {
        &self.options
    }

    /// Returns the identity of `key`, creating it if needed, and takes a reference on it.
    ///
    /// With `impersonate` the identity acts as the session's user on behalf of the gateway's login
    /// identity; otherwise a plain identity for the user is created.
    pub fn acquire(&self, key: &SessionKey, impersonate: bool) -> ConfluxResult<P::Identity> {
        let segment = self.segment(key.segment_id());
        let mut sessions = segment.lock();
        let now = self.clock.now();
        self.sweep(&mut sessions, key.segment_id(), now);

        if let Some(entry) = sessions.entries.get_mut(key) {
            entry.ref_count += 1;
            log::debug!("{} Reusing identity, {} references", key, entry.ref_count);
            return Ok(entry.identity.clone());
        }

        let identity = if impersonate {
            log::debug!("{} Creating impersonated identity for {}", key, key.user());
            let login = self.provider.login_identity(key.server_name())?;
            self.provider.create_impersonated(key.user(), &login)?
        } else {
            log::debug!("{} Creating remote identity for {}", key, key.user());
            self.provider
                .create_remote(key.user(), key, self.options.security_enabled)?
        };
        self.created.inc();
        sessions.insert(key.clone(), identity.clone(), now + self.options.ttl);
        Ok(identity)
    }

    /// Like [`acquire`](Self::acquire), returning a guard that releases the reference when dropped.
    pub fn acquire_guard(
        &self,
        key: &SessionKey,
        impersonate: bool,
    ) -> ConfluxResult<IdentityGuard<'_, P>> {
        let identity = self.acquire(key, impersonate)?;
        Ok(IdentityGuard::new(self, key.clone(), identity))
    }

    /// Drops a reference on the identity of `key`.
    ///
    /// When `clean_immediately` is set and no references remain, the identity is destroyed right
    /// away. Otherwise its expiry is pushed back by the TTL. Releasing a key that is not cached, or
    /// that has no references left, is an error.
    pub fn release(&self, key: &SessionKey, clean_immediately: bool) -> ConfluxResult<()> {
        let segment = self
            .segments
            .get(&key.segment_id())
            .map(|segment| segment.clone())
            .ok_or_else(|| {
                conflux_err!(ResourceState: "Cannot release identity, {} is not cached", key)
            })?;
        let mut sessions = segment.lock();
        let now = self.clock.now();

        let Some(entry) = sessions.entries.get_mut(key) else {
            conflux_bail!(ResourceState: "Cannot release identity, {} is not cached", key);
        };
        if entry.ref_count == 0 {
            conflux_bail!(
                ResourceState: "Cannot release identity, {} has no references left",
                key
            );
        }
        entry.ref_count -= 1;

        if clean_immediately && entry.ref_count == 0 {
            if let Some(entry) = sessions.remove(key) {
                self.destroy(key, &entry.identity);
            }
        } else {
            sessions.reschedule(key, now + self.options.ttl);
        }

        self.sweep(&mut sessions, key.segment_id(), now);
        Ok(())
    }

    /// Number of cached identities across all segments.
    pub fn len(&self) -> usize {
        self.each_segment(|sessions| sessions.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries waiting in the expiry queues of all segments.
    pub fn queued(&self) -> usize {
        self.each_segment(|sessions| sessions.expiry.len())
    }

    /// Whether `key` is cached and scheduled for expiry.
    pub fn contains(&self, key: &SessionKey) -> bool {
        let Some(segment) = self
            .segments
            .get(&key.segment_id())
            .map(|segment| segment.clone())
        else {
            return false;
        };
        let sessions = segment.lock();
        sessions
            .entries
            .get(key)
            .is_some_and(|entry| sessions.expiry.contains_key(&entry.deadline))
    }

    /// Number of segments that have used the cache so far.
    pub fn segments(&self) -> usize {
        self.segments.len()
    }

    /// Reference count of `key`, if cached.
    pub fn ref_count(&self, key: &SessionKey) -> Option<usize> {
        let segment = self
            .segments
            .get(&key.segment_id())
            .map(|segment| segment.clone())?;
        let sessions = segment.lock();
        sessions.entries.get(key).map(|entry| entry.ref_count)
    }

    fn segment(&self, segment_id: u32) -> Arc<Mutex<SegmentSessions<P::Identity>>> {
        self.segments.entry(segment_id).or_default().clone()
    }

    fn each_segment(&self, f: impl Fn(&SegmentSessions<P::Identity>) -> usize) -> usize {
        let segments = self
            .segments
            .iter()
            .map(|segment| segment.value().clone())
            .collect::<Vec<_>>();
        segments.iter().map(|segment| f(&segment.lock())).sum()
    }

    /// Destroys expired, unreferenced identities and reschedules the referenced ones.
    fn sweep(
        &self,
        sessions: &mut SegmentSessions<P::Identity>,
        segment_id: u32,
        now: Instant,
    ) {
        let expired = sessions.expired(now);
        if expired.is_empty() {
            return;
        }

        for key in expired {
            let in_use = sessions
                .entries
                .get(&key)
                .is_some_and(|entry| entry.ref_count > 0);
            if in_use {
                log::debug!("{} Skipping teardown of identity still in use", key);
                sessions.reschedule(&key, now + self.options.ttl);
                self.rescheduled.inc();
            } else if let Some(entry) = sessions.remove(&key) {
                self.destroy(&key, &entry.identity);
            }
        }
        log::debug!(
            "Expiry queue size for segment {} = {}",
            segment_id,
            sessions.expiry.len()
        );
    }

    /// Tears down an identity already removed from the cache. Failures are logged and swallowed.
    fn destroy(&self, key: &SessionKey, identity: &P::Identity) {
        self.destroyed.inc();
        match self.provider.destroy(identity) {
            Ok(()) => log::debug!("{} Destroyed identity for {}", key, key.user()),
            Err(err) => {
                self.destroy_failures.inc();
                log::warn!("{} Error destroying identity for {}: {}", key, key.user(), err);
            }
        }
    }
}
