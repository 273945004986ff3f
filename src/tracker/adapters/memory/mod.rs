//! Scripted in-memory tracker.

mod client;

pub use client::{InMemoryTrackerClient, TrackerWrite};
