//! Structured tracing macros for the voxen runtime.
//!
//! Each macro logs under a fixed target so operators can filter scheduler
//! lifecycle noise from per-job diagnostics independently
//! (`RUST_LOG=voxen::scheduler=debug,voxen::jobs=warn`).
//!
//! When the `no-trace` feature is enabled, every macro compiles to nothing
//! for zero overhead in production/benchmark builds.

// ---- With tracing enabled (default) ----

/// Trace scheduler-level events (lifecycle, worker wake/park, shutdown).
#[cfg(not(feature = "no-trace"))]
#[macro_export]
macro_rules! vox_sched {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "voxen::scheduler", $($arg)*)
    }
}

/// Trace per-job events (stalls, execution diagnostics) with worker context.
#[cfg(not(feature = "no-trace"))]
#[macro_export]
macro_rules! vox_job {
    ($level:ident, worker = $worker:expr, $($arg:tt)*) => {
        tracing::$level!(target: "voxen::jobs", worker = $worker, $($arg)*)
    };
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "voxen::jobs", $($arg)*)
    }
}

// ---- With tracing disabled (no-trace feature) ----

/// Trace scheduler-level events - compiles to nothing when no-trace is enabled.
#[cfg(feature = "no-trace")]
#[macro_export]
macro_rules! vox_sched {
    ($level:ident, $($arg:tt)*) => {};
}

/// Trace per-job events - compiles to nothing when no-trace is enabled.
#[cfg(feature = "no-trace")]
#[macro_export]
macro_rules! vox_job {
    ($level:ident, worker = $worker:expr, $($arg:tt)*) => {};
    ($level:ident, $($arg:tt)*) => {};
}
