//! Viewer descriptors, team rosters and visibility queries.

mod query;
mod viewer;

pub use query::{SourceFilter, SourcePolicy, ViewFilter, VisibilityQuery};
pub use viewer::{TeamId, TeamRoster, Viewer};
