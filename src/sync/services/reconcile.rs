//! One-way reconciliation of a tracker scope into the task store.
//!
//! A pass fetches the scope's remote issues, refreshes or creates the
//! matching tasks by external reference, and tombstones covered tasks whose
//! issue is gone. Nothing is ever written back to the tracker.

use crate::sync::domain::{SyncReport, SyncScope, SyncSettings};
use crate::task::{
    domain::{
        ExternalLink, ExternalRef, PlatformHandle, Routing, Task, TaskPatch, TrackerSource,
        WorkType,
    },
    ports::{SourceListing, TaskStore, TaskStoreError, TaskStoreResult, UpsertOutcome},
};
use crate::tracker::{
    domain::{RemoteIssue, is_completed_status, map_priority},
    ports::{TrackerClient, TrackerClientError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Failures that abort a pass before any task is written.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote fetch failed.
    #[error("failed to fetch remote issues: {0}")]
    Fetch(#[source] TrackerClientError),
    /// The locally known tasks could not be loaded.
    #[error("failed to load existing tasks: {0}")]
    LoadExisting(#[source] TaskStoreError),
}

/// Result type for reconciliation passes.
pub type SyncResult<T> = Result<T, SyncError>;

/// Reconciles tracker scopes into the task store.
#[derive(Clone)]
pub struct ReconciliationService<S, T, C>
where
    S: TaskStore,
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    tracker: Arc<T>,
    clock: Arc<C>,
    settings: SyncSettings,
}

impl<S, T, C> ReconciliationService<S, T, C>
where
    S: TaskStore,
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service.
    #[must_use]
    pub const fn new(store: Arc<S>, tracker: Arc<T>, clock: Arc<C>, settings: SyncSettings) -> Self {
        Self {
            store,
            tracker,
            clock,
            settings,
        }
    }

    /// Returns the pass settings.
    #[must_use]
    pub const fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Runs one reconciliation pass for `scope`.
    ///
    /// Per-issue failures are counted in [`SyncReport::failed`] and do not
    /// abort the pass. Running the same pass twice against an unchanged
    /// remote creates, changes and tombstones nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the remote fetch or the load of existing
    /// tasks fails. No task is written in that case.
    #[instrument(skip_all, fields(scope = %scope))]
    pub async fn reconcile(&self, scope: &SyncScope) -> SyncResult<SyncReport> {
        let source = self.tracker.source();
        let remote = self
            .tracker
            .fetch_issues(&scope.filter_expression(), self.settings.max_results)
            .await
            .map_err(SyncError::Fetch)?;
        let existing = self
            .store
            .list_by_source(source, SourceListing::all_owners())
            .await
            .map_err(SyncError::LoadExisting)?;

        let mut report = SyncReport {
            total_remote: remote.len(),
            ..SyncReport::default()
        };
        let known = self.index_known(existing, &mut report).await;

        let mut seen = HashSet::with_capacity(remote.len());
        for issue in &remote {
            let remote_id = issue.remote_id.trim();
            if !seen.insert(remote_id.to_owned()) {
                debug!(remote_id, "skipping duplicate remote issue");
                continue;
            }
            match self.apply_issue(scope, source, issue).await {
                Ok(outcome) => record_outcome(&mut report, &outcome),
                Err(err) => {
                    report.failed += 1;
                    warn!(remote_id, key = %issue.key, error = %err, "failed to reconcile issue");
                }
            }
        }

        report.truncated = self.is_truncated(remote.len());
        if report.truncated {
            warn!(
                total_remote = report.total_remote,
                max_results = self.settings.max_results,
                "remote result set may be truncated, skipping tombstones"
            );
        } else {
            self.tombstone_missing(scope, &known, &seen, &mut report)
                .await;
        }

        info!(
            created = report.created,
            updated = report.updated,
            changed = report.changed,
            revived = report.revived,
            tombstoned = report.tombstoned,
            demoted = report.demoted,
            failed = report.failed,
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Indexes existing tasks by external identifier, demoting any whose
    /// identifier does not have the tracker's format.
    async fn index_known(
        &self,
        existing: Vec<Task>,
        report: &mut SyncReport,
    ) -> HashMap<String, Task> {
        let mut known = HashMap::with_capacity(existing.len());
        for task in existing {
            let Some(reference) = task.external_ref() else {
                continue;
            };
            if reference.is_well_formed() {
                known.insert(reference.external_id().to_owned(), task);
                continue;
            }
            let external_id = reference.external_id().to_owned();
            match self.store.demote(task.id(), self.clock.utc()).await {
                Ok(_) => {
                    report.demoted += 1;
                    warn!(task_id = %task.id(), %external_id, "demoted task with malformed external id");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(task_id = %task.id(), %external_id, error = %err, "failed to demote task");
                }
            }
        }
        known
    }

    async fn apply_issue(
        &self,
        scope: &SyncScope,
        source: TrackerSource,
        issue: &RemoteIssue,
    ) -> TaskStoreResult<UpsertOutcome> {
        let reference = ExternalRef::new(source, &issue.remote_id)?;
        let patch = remote_patch(issue, reference, scope.assignee());
        let at = self.clock.utc();
        let candidate = self.candidate(scope, &issue.summary, &patch, at)?;
        self.store
            .upsert_by_external_ref(&candidate, &patch, at)
            .await
    }

    fn candidate(
        &self,
        scope: &SyncScope,
        summary: &str,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> TaskStoreResult<Task> {
        let routing = Routing::new(self.settings.tracker_route, WorkType::Task);
        let mut task = Task::new_at(scope.owner(), summary, routing, at)?;
        task.apply_patch(patch, at)?;
        Ok(task)
    }

    async fn tombstone_missing(
        &self,
        scope: &SyncScope,
        known: &HashMap<String, Task>,
        seen: &HashSet<String>,
        report: &mut SyncReport,
    ) {
        let missing = known
            .iter()
            .filter(|(external_id, task)| !seen.contains(*external_id) && scope.covers(task));
        for (external_id, task) in missing {
            match self.store.tombstone(task.id(), self.clock.utc()).await {
                Ok(true) => {
                    report.tombstoned += 1;
                    debug!(task_id = %task.id(), %external_id, "tombstoned task missing from scope");
                }
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(task_id = %task.id(), %external_id, error = %err, "failed to tombstone task");
                }
            }
        }
    }

    fn is_truncated(&self, fetched: usize) -> bool {
        let limit = usize::try_from(self.settings.max_results).unwrap_or(usize::MAX);
        limit > 0 && fetched >= limit
    }
}

const fn record_outcome(report: &mut SyncReport, outcome: &UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created(_) => report.created += 1,
        UpsertOutcome::Updated { changed, .. } => {
            report.updated += 1;
            if *changed {
                report.changed += 1;
            }
        }
        UpsertOutcome::Revived(_) => report.revived += 1,
    }
}

/// Builds the tracked field set a remote issue asserts.
///
/// A missing remote priority leaves the local one alone; every other field
/// is overwritten, including with "cleared" values. Issues fetched by
/// assignee that omit the assignee field get the scope's assignee.
fn remote_patch(
    issue: &RemoteIssue,
    reference: ExternalRef,
    scope_assignee: Option<&PlatformHandle>,
) -> TaskPatch {
    let status = issue.status.as_ref().map(|field| field.name.clone());
    let external = ExternalLink {
        reference,
        key: issue.key.clone(),
        url: issue.url.clone(),
        remote_status: status,
        remote_issue_type: issue.issue_type.as_ref().map(|field| field.name.clone()),
        remote_priority: issue.priority.as_ref().map(|field| field.name.clone()),
    };
    let mut patch = TaskPatch::new()
        .with_title(issue.summary.clone())
        .with_description(issue.description.clone())
        .with_tags(issue.labels.iter().cloned())
        .with_due_date(issue.due_date)
        .with_assignee(
            PlatformHandle::parse_optional(issue.assignee.as_deref())
                .or_else(|| scope_assignee.cloned()),
        )
        .with_assignor(PlatformHandle::parse_optional(issue.reporter.as_deref()))
        .with_external(external)
        .with_completed(is_completed_status(issue.status_name()));
    if issue.priority.is_some() {
        patch = patch.with_priority(map_priority(issue.priority_name()));
    }
    patch
}
