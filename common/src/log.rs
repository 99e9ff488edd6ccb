//! Status logging on top of `tracing`.
//!
//! `tracing` has no notion of a "success" level, so it is modelled as an
//! `INFO` event on a dedicated target that the CLI formatter renders differently.

/// Target used for events emitted through [`success!`](crate::success).
pub const SUCCESS_TARGET: &str = "edgerank::success";

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: $crate::log::SUCCESS_TARGET, $($arg)*)
    };
}

/// Target for pre-formatted terminal output. The message travels in the `raw_msg` field
/// and is printed without a status symbol.
pub const PRINT_TARGET: &str = "edgerank::print";
