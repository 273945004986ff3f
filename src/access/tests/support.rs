//! Task builders for visibility tests.

use crate::task::domain::{
    ExternalLink, ExternalRef, PlatformHandle, Route, Routing, Task, TaskPatch, TrackerSource,
    UserId, WorkType,
};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ISSUE: AtomicU64 = AtomicU64::new(1);

pub fn handle(value: &str) -> PlatformHandle {
    PlatformHandle::new(value).expect("valid handle")
}

/// Declarative description of a candidate task.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub owner: UserId,
    pub route: Route,
    pub work_type: WorkType,
    pub assignee: Option<PlatformHandle>,
    pub assignor: Option<PlatformHandle>,
    pub mentioned: Vec<PlatformHandle>,
    pub linked: Option<TrackerSource>,
    pub tombstoned: bool,
}

impl TaskDraft {
    pub const fn owned_by(owner: UserId) -> Self {
        Self {
            owner,
            route: Route::TrackB,
            work_type: WorkType::Task,
            assignee: None,
            assignor: None,
            mentioned: Vec::new(),
            linked: None,
            tombstoned: false,
        }
    }

    pub const fn on(mut self, route: Route, work_type: WorkType) -> Self {
        self.route = route;
        self.work_type = work_type;
        self
    }

    pub fn assigned(mut self, assignee: Option<&str>, assignor: Option<&str>) -> Self {
        self.assignee = assignee.map(handle);
        self.assignor = assignor.map(handle);
        self
    }

    pub fn mentioning(mut self, mentioned: &str) -> Self {
        self.mentioned.push(handle(mentioned));
        self
    }

    pub const fn linked_to(mut self, source: TrackerSource) -> Self {
        self.linked = Some(source);
        self
    }

    pub const fn tombstoned(mut self) -> Self {
        self.tombstoned = true;
        self
    }

    pub fn build(&self) -> Task {
        let now = Utc::now();
        let mut task = Task::new_at(
            self.owner,
            "Candidate",
            Routing::new(self.route, self.work_type),
            now,
        )
        .expect("valid task");
        let mut patch = TaskPatch::new()
            .with_assignee(self.assignee.clone())
            .with_assignor(self.assignor.clone())
            .with_mentioned(self.mentioned.iter().cloned());
        if let Some(source) = self.linked {
            let external_id = match source {
                TrackerSource::Linear => uuid::Uuid::new_v4().to_string(),
                TrackerSource::Jira | TrackerSource::GitHub => {
                    NEXT_ISSUE.fetch_add(1, Ordering::Relaxed).to_string()
                }
            };
            let reference = ExternalRef::new(source, &external_id).expect("valid reference");
            patch = patch.with_external(ExternalLink::new(reference, "KEY-1"));
        }
        task.apply_patch(&patch, now).expect("patch applies");
        if self.tombstoned {
            task.tombstone(now);
        }
        task
    }
}
