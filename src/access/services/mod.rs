//! Visibility filtering.

mod filter;
mod visibility;

pub use filter::{AccessFilter, AccessRequest, Stage};
pub use visibility::AccessService;
