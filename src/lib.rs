//! Marquee: before/after index comparison diagnostics for the movie
//! analytics document store.

pub mod compare;
pub mod config;
pub mod error;
pub mod explain;
pub mod index;
pub mod metrics;
pub mod provision;
pub mod seed;
pub mod server;
pub mod store;
pub mod timing;
pub mod types;
