//! Work routing: which track a task belongs to, and the role policy that
//! chooses a track for new tasks and for viewers.

use super::ParseTaskValueError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Work track a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Commercial track (outreach, deals, customer follow-ups).
    TrackA,
    /// Engineering track (tickets, code review, incidents).
    TrackB,
}

impl Route {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrackA => "track_a",
            Self::TrackB => "track_b",
        }
    }
}

impl TryFrom<&str> for Route {
    type Error = ParseTaskValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "track_a" => Ok(Self::TrackA),
            "track_b" => Ok(Self::TrackB),
            _ => Err(ParseTaskValueError::new("route", value)),
        }
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    /// Generic work item.
    Task,
    /// Meeting or calendar follow-up.
    Calendar,
    /// Outbound contact with a prospect or customer.
    Outreach,
    /// Email follow-up.
    Email,
}

impl WorkType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Calendar => "calendar",
            Self::Outreach => "outreach",
            Self::Email => "email",
        }
    }
}

impl TryFrom<&str> for WorkType {
    type Error = ParseTaskValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "calendar" => Ok(Self::Calendar),
            "outreach" => Ok(Self::Outreach),
            "email" => Ok(Self::Email),
            _ => Err(ParseTaskValueError::new("work type", value)),
        }
    }
}

/// Routing decision attached to a task at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Routing {
    /// Track the task is routed to.
    pub route_to: Route,
    /// Kind of work.
    pub work_type: WorkType,
}

impl Routing {
    /// Creates a routing decision.
    #[must_use]
    pub const fn new(route_to: Route, work_type: WorkType) -> Self {
        Self {
            route_to,
            work_type,
        }
    }
}

/// Organisational role of a local user, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// Creates a normalized role name.
    #[must_use]
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_lowercase())
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Explicit `role -> default route` table plus the dual-route work types.
///
/// Dual-route work types are visible on every track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    defaults: BTreeMap<Role, Route>,
    fallback: Route,
    dual_route: BTreeSet<WorkType>,
}

impl RoutePolicy {
    /// Creates a policy with no role entries.
    #[must_use]
    pub const fn new(fallback: Route) -> Self {
        Self {
            defaults: BTreeMap::new(),
            fallback,
            dual_route: BTreeSet::new(),
        }
    }

    /// Adds or replaces the default route for a role.
    #[must_use]
    pub fn with_role(mut self, role: Role, route: Route) -> Self {
        self.defaults.insert(role, route);
        self
    }

    /// Replaces the dual-route work type set.
    #[must_use]
    pub fn with_dual_route(mut self, work_types: impl IntoIterator<Item = WorkType>) -> Self {
        self.dual_route = work_types.into_iter().collect();
        self
    }

    /// Returns the default route for a role, or the fallback route.
    #[must_use]
    pub fn default_route(&self, role: &Role) -> Route {
        self.defaults.get(role).copied().unwrap_or(self.fallback)
    }

    /// Returns whether tasks of this work type are visible on every track.
    #[must_use]
    pub fn is_dual_route(&self, work_type: WorkType) -> bool {
        self.dual_route.contains(&work_type)
    }

    /// Derives routing for a task created by a user with `role`.
    #[must_use]
    pub fn route_for(&self, role: &Role, work_type: WorkType) -> Routing {
        Routing::new(self.default_route(role), work_type)
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(Route::TrackA)
            .with_role(Role::new("sales"), Route::TrackA)
            .with_role(Role::new("developer"), Route::TrackB)
            .with_dual_route([WorkType::Calendar, WorkType::Email])
    }
}
