//! Visibility query options and the per-role source policy.

use crate::task::domain::{ParseTaskValueError, Role, Task, TrackerSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Restricts visible tasks by where they come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceFilter {
    /// Tracked and local tasks.
    #[default]
    Any,
    /// Only tasks linked to some tracker.
    Tracked,
    /// Only tasks with no tracker link.
    Local,
    /// Only tasks linked to one tracker.
    Only(TrackerSource),
}

impl SourceFilter {
    /// Returns whether `task` passes the filter.
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        let linked = task.external_ref();
        match self {
            Self::Any => true,
            Self::Tracked => linked.is_some(),
            Self::Local => linked.is_none(),
            Self::Only(source) => linked.is_some_and(|reference| reference.source() == source),
        }
    }

    /// Returns the configuration representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Tracked => "tracked",
            Self::Local => "local",
            Self::Only(source) => source.as_str(),
        }
    }
}

impl TryFrom<&str> for SourceFilter {
    type Error = ParseTaskValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "tracked" => Ok(Self::Tracked),
            "local" => Ok(Self::Local),
            other => TrackerSource::try_from(other)
                .map(Self::Only)
                .map_err(|_| ParseTaskValueError::new("source filter", value)),
        }
    }
}

impl TryFrom<String> for SourceFilter {
    type Error = ParseTaskValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<SourceFilter> for String {
    fn from(value: SourceFilter) -> Self {
        value.as_str().to_owned()
    }
}

/// Optional narrowing on the assignment fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewFilter {
    /// The viewer is the assignee.
    AssignedToMe,
    /// The viewer is the assignor.
    AssignedByMe,
    /// The viewer owns the task or is its assignee.
    MyTasks,
}

/// What the viewer asked to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityQuery {
    /// Request the team-wide view.
    pub team_view: bool,
    /// Explicit source filter; `None` applies the role default.
    pub source: Option<SourceFilter>,
    /// Optional view narrowing.
    pub view: Option<ViewFilter>,
}

impl VisibilityQuery {
    /// Requests the team-wide view.
    #[must_use]
    pub const fn team() -> Self {
        Self {
            team_view: true,
            source: None,
            view: None,
        }
    }

    /// Sets an explicit source filter.
    #[must_use]
    pub const fn with_source(mut self, source: SourceFilter) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets a view filter.
    #[must_use]
    pub const fn with_view(mut self, view: ViewFilter) -> Self {
        self.view = Some(view);
        self
    }
}

/// Default source filter per role. Roles without an entry see every source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePolicy {
    defaults: BTreeMap<Role, SourceFilter>,
}

impl SourcePolicy {
    /// Creates a policy where every role sees every source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default filter for `role`.
    #[must_use]
    pub fn with_role(mut self, role: Role, filter: SourceFilter) -> Self {
        self.defaults.insert(role, filter);
        self
    }

    /// Returns the default filter for `role`.
    #[must_use]
    pub fn default_for(&self, role: &Role) -> SourceFilter {
        self.defaults.get(role).copied().unwrap_or_default()
    }
}
