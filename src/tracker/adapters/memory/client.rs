//! In-memory tracker client with scripted query results.
//!
//! Result sets are keyed by the exact filter expression a scope renders.
//! Writes are recorded, and transitions also move the status of every
//! scripted copy of the issue so later fetches observe them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::domain::TrackerSource;
use crate::tracker::{
    domain::{IssueFieldUpdate, NamedField, RemoteIssue},
    ports::{TrackerClient, TrackerClientError, TrackerClientResult},
};

/// Write recorded by [`InMemoryTrackerClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerWrite {
    /// A field update.
    Update {
        /// Issue key.
        key: String,
        /// Pushed fields.
        fields: IssueFieldUpdate,
    },
    /// A workflow transition.
    Transition {
        /// Issue key.
        key: String,
        /// Transition name.
        transition: String,
    },
}

/// Thread-safe scripted tracker client.
#[derive(Debug, Clone)]
pub struct InMemoryTrackerClient {
    source: TrackerSource,
    state: Arc<RwLock<InMemoryTrackerState>>,
}

#[derive(Debug, Default)]
struct InMemoryTrackerState {
    result_sets: HashMap<String, Vec<RemoteIssue>>,
    fetch_failure: Option<TrackerClientError>,
    writes: Vec<TrackerWrite>,
    fetch_count: usize,
}

impl InMemoryTrackerClient {
    /// Creates a client with no scripted results.
    #[must_use]
    pub fn new(source: TrackerSource) -> Self {
        Self {
            source,
            state: Arc::default(),
        }
    }

    /// Scripts the issues returned for `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError::Transport`] if the state lock is
    /// poisoned.
    pub fn set_issues(
        &self,
        filter: impl Into<String>,
        issues: impl IntoIterator<Item = RemoteIssue>,
    ) -> TrackerClientResult<()> {
        let mut state = self.write_state()?;
        state
            .result_sets
            .insert(filter.into(), issues.into_iter().collect());
        Ok(())
    }

    /// Makes every subsequent fetch fail with `error`, or succeed again
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError::Transport`] if the state lock is
    /// poisoned.
    pub fn set_fetch_failure(&self, error: Option<TrackerClientError>) -> TrackerClientResult<()> {
        self.write_state()?.fetch_failure = error;
        Ok(())
    }

    /// Returns the writes recorded so far.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError::Transport`] if the state lock is
    /// poisoned.
    pub fn writes(&self) -> TrackerClientResult<Vec<TrackerWrite>> {
        Ok(self.read_state()?.writes.clone())
    }

    /// Returns how many fetches were attempted.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerClientError::Transport`] if the state lock is
    /// poisoned.
    pub fn fetch_count(&self) -> TrackerClientResult<usize> {
        Ok(self.read_state()?.fetch_count)
    }

    fn read_state(&self) -> TrackerClientResult<RwLockReadGuard<'_, InMemoryTrackerState>> {
        self.state
            .read()
            .map_err(|err| TrackerClientError::transport(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> TrackerClientResult<RwLockWriteGuard<'_, InMemoryTrackerState>> {
        self.state
            .write()
            .map_err(|err| TrackerClientError::transport(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl TrackerClient for InMemoryTrackerClient {
    fn source(&self) -> TrackerSource {
        self.source
    }

    async fn fetch_issues(
        &self,
        filter: &str,
        max_results: u32,
    ) -> TrackerClientResult<Vec<RemoteIssue>> {
        let mut state = self.write_state()?;
        state.fetch_count += 1;
        if let Some(error) = &state.fetch_failure {
            return Err(error.clone());
        }
        let limit = usize::try_from(max_results).unwrap_or(usize::MAX);
        Ok(state
            .result_sets
            .get(filter)
            .map(|issues| issues.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_issue(&self, key: &str, fields: &IssueFieldUpdate) -> TrackerClientResult<()> {
        let mut state = self.write_state()?;
        state.writes.push(TrackerWrite::Update {
            key: key.to_owned(),
            fields: fields.clone(),
        });
        Ok(())
    }

    async fn transition_issue(&self, key: &str, transition: &str) -> TrackerClientResult<()> {
        let mut state = self.write_state()?;
        state
            .result_sets
            .values_mut()
            .flatten()
            .filter(|issue| issue.key == key)
            .for_each(|issue| issue.status = Some(NamedField::new(transition)));
        state.writes.push(TrackerWrite::Transition {
            key: key.to_owned(),
            transition: transition.to_owned(),
        });
        Ok(())
    }
}
