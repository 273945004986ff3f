//! Domain values for reconciliation passes.

mod report;
mod scope;

pub use report::{SyncReport, SyncSettings};
pub use scope::SyncScope;
