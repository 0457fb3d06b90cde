use conflux_error::ConfluxResult;

use crate::SessionKey;

/// Creates and tears down identities. The impersonation protocol itself lives behind this trait.
///
/// Every call is made while holding the lock of the session's segment, which blocks the calling
/// thread. Implementations must return promptly and must not wait on async work; other requests of
/// the same segment, possibly on async runtime workers, wait for the call to finish.
pub trait IdentityProvider: Send + Sync {
    type Identity: Clone + Send + Sync + 'static;

    /// The identity the gateway itself runs as when talking to `server_name`.
    fn login_identity(&self, server_name: &str) -> ConfluxResult<Self::Identity>;

    /// An identity acting as `user` on behalf of `login`.
    fn create_impersonated(
        &self,
        user: &str,
        login: &Self::Identity,
    ) -> ConfluxResult<Self::Identity>;

    /// A plain identity for `user`, not backed by the gateway's own credentials.
    fn create_remote(
        &self,
        user: &str,
        session: &SessionKey,
        security_enabled: bool,
    ) -> ConfluxResult<Self::Identity>;

    /// Releases whatever the identity holds on to (filesystem handles, tickets).
    fn destroy(&self, identity: &Self::Identity) -> ConfluxResult<()>;
}
