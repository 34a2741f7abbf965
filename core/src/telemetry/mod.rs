//! telemetry/mod.rs
//! Read-side counters, exportable through serde.

pub mod counters;

pub use counters::*;
