//! Tracker client adapters.

pub mod memory;
