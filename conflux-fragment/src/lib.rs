//! Fragments are the schedulable units of external data (a file, a byte range, a table split).
//!
//! Every parallel worker ("segment") of the calling database asks for the fragments of the same
//! scan independently. This crate makes sure the fragment list is computed once per query, no
//! matter how many segments ask concurrently, and hands each segment a disjoint slice of it.

pub use cache::*;
pub use distribute::*;
pub use fragment::*;
pub use key::*;
pub use retry::*;
pub use service::*;
pub use source::*;
pub use stats::*;

mod cache;
mod distribute;
mod fragment;
mod key;
mod retry;
mod service;
mod source;
mod stats;
