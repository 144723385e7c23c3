//! Metrics collection and export for chatmux.
//!
//! Crates record through the `metrics` facade macros re-exported here, using
//! the names in [`connections`], [`bus`] and [`messages`]. Nothing is kept
//! until [`init_metrics`] installs a recorder; with the `prometheus` feature
//! the recorder renders the Prometheus text format.
//!
//! ```rust,ignore
//! use chatmux_metrics::{connections, gauge};
//!
//! gauge!(connections::ACTIVE).set(2.0);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
