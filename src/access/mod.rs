//! Per-viewer task visibility.
//!
//! Given a viewer descriptor and candidate tasks, the access filter keeps
//! the subset the viewer may see: their own and involved tasks on their
//! role's track, or their team's tasks when a team view is requested.
//! Routing and source defaults come from injected policy tables.

pub mod domain;
pub mod services;
