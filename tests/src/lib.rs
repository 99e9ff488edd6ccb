//! End-to-end tests for edgerank against local stub servers.

pub mod stub;

mod pipeline;
mod probes;
