//! Application services that write to the external tracker.

mod writeback;

pub use writeback::{TrackerWriteBackService, TransitionTable, WriteBackError, WriteBackResult};
