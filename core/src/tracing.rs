//! Tracing utilities for graph, statement and write observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! Each macro is defined twice so the feature check happens in this crate:
//! downstream crates expand either the forwarding body or nothing, without
//! `#[cfg]` boilerplate at call sites.

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "tracing")]
    pub use ::tracing;
}

/// Emit a debug-level event for planning work (path search, statement build).
///
/// ```ignore
/// tangle_trace_plan!(from = %from, to = %to, hops = 2, "tangle.path");
/// ```
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tangle_trace_plan {
    ($($arg:tt)+) => {
        $crate::tracing::__private::tracing::debug!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tangle_trace_plan {
    ($($arg:tt)+) => {};
}

/// Emit an info-level event for a write issued against a service.
///
/// ```ignore
/// tangle_trace_write!(model = %model, action = "create", "tangle.write");
/// ```
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tangle_trace_write {
    ($($arg:tt)+) => {
        $crate::tracing::__private::tracing::info!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tangle_trace_write {
    ($($arg:tt)+) => {};
}

/// Emit a warn-level event when a pass is aborted.
#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! tangle_trace_abort {
    ($($arg:tt)+) => {
        $crate::tracing::__private::tracing::warn!($($arg)+)
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! tangle_trace_abort {
    ($($arg:tt)+) => {};
}
