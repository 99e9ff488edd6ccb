//! # edgerank core
//!
//! The measurement pipeline: picking candidates from published CDN ranges, probing
//! them concurrently, ranking the answers and remembering which addresses were worth
//! it. [`runner::run`] ties the pieces together.

pub mod aggregate;
pub mod hosts;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod selector;
pub mod store;
