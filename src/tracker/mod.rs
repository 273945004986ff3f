//! External issue tracker integration.
//!
//! The tracker is the authoritative source for externally linked tasks.
//! This module holds the client port the reconciliation engine reads
//! through, the status and priority vocabulary translator, a scripted
//! in-memory client, and the user-initiated write-back service.
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
