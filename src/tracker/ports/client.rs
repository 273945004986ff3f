//! Client port for one external issue tracker.
//!
//! Credentials are owned by the implementation and assumed to be valid;
//! token refresh happens outside this crate.

use crate::task::domain::TrackerSource;
use crate::tracker::domain::{IssueFieldUpdate, RemoteIssue};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for tracker client operations.
pub type TrackerClientResult<T> = Result<T, TrackerClientError>;

/// Read and write access to an external issue tracker.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Returns the tracker this client talks to.
    fn source(&self) -> TrackerSource;

    /// Returns every issue matching `filter`, up to `max_results`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError`] on network, authentication or rate
    /// limit failures. Partial result sets are never returned.
    async fn fetch_issues(
        &self,
        filter: &str,
        max_results: u32,
    ) -> TrackerClientResult<Vec<RemoteIssue>>;

    /// Updates fields of the issue identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError`] when the tracker rejects the update.
    async fn update_issue(&self, key: &str, fields: &IssueFieldUpdate) -> TrackerClientResult<()>;

    /// Moves the issue identified by `key` through the named workflow
    /// transition.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError`] when the transition is unavailable or
    /// the request fails.
    async fn transition_issue(&self, key: &str, transition: &str) -> TrackerClientResult<()>;
}

/// Errors returned by tracker clients.
#[derive(Debug, Clone, Error)]
pub enum TrackerClientError {
    /// The tracker rejected the credential.
    #[error("tracker rejected credentials")]
    Unauthorized,

    /// The tracker throttled the request.
    #[error("tracker rate limit exceeded")]
    RateLimited,

    /// The issue does not exist or is not visible.
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    /// The requested workflow transition is not available.
    #[error("transition '{transition}' unavailable for {key}")]
    TransitionUnavailable {
        /// Issue key.
        key: String,
        /// Requested transition name.
        transition: String,
    },

    /// Transport-level failure.
    #[error("tracker transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TrackerClientError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
