//! Index lifecycle for comparison runs.
//!
//! Provides lookup of an index by its exact key specification, best-effort
//! drops, and index creation whose failure aborts the experiment.

pub mod lifecycle;

pub use lifecycle::IndexLifecycle;
