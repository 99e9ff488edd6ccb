//! # edgerank common
//!
//! Shared models for the edgerank workspace: the run [`config::Config`], IPv4
//! [`network::range::AddressRange`]s and the [`network::result::ResultSet`] that is
//! persisted between runs.
//!
//! Logging goes through `tracing`; the macros are re-exported here so every crate
//! logs the same way.

pub mod config;
pub mod log;
pub mod network;

pub use tracing::{debug, error, info, trace, warn};

#[doc(hidden)]
pub use tracing as __tracing;
