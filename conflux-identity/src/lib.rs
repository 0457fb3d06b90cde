//! Identities are the impersonation contexts used to call the external store as a given user.
//!
//! Creating one is expensive, and a single segment issues many requests within a query, so the
//! identities are cached per [`SessionKey`], reference counted while requests use them, and torn
//! down once they are unused and idle. Every segment has its own lock and expiry queue, so traffic
//! on one segment never waits on another.

pub use cache::*;
pub use clock::*;
pub use guard::*;
pub use key::*;
pub use provider::*;

mod cache;
mod clock;
mod guard;
mod key;
mod provider;
