//! Task records and their local lifecycle.
//!
//! Tasks are either local or linked to one issue in an external tracker.
//! Linked tasks are written by reconciliation; user edits go through the
//! lifecycle service, which pins edited tracked fields according to the
//! configured conflict policy. Tasks are never hard-deleted, only
//! tombstoned. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
