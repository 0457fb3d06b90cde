//! Conflux lets the parallel workers ("segments") of a database scan external data through a
//! shared gateway.
//!
//! The [`Gateway`] owns the process-wide state: the single-flight fragment cache and the
//! per-segment identity cache. A [`ReadBridge`] serves one segment request end to end, from
//! fetching the segment's fragments to pushing encoded rows into the response.

pub use bridge::*;
pub use config::*;
pub use context::*;
pub use gateway::*;

mod bridge;
mod config;
mod context;
mod gateway;

pub use conflux_error as error;
pub use conflux_fragment as fragment;
pub use conflux_identity as identity;
pub use conflux_metrics as metrics;
pub use conflux_record as record;
