//! Port contracts for external issue trackers.

pub mod client;

pub use client::{TrackerClient, TrackerClientError, TrackerClientResult};
