//! Staged visibility filter.
//!
//! Every stage is a predicate that can only remove tasks, so the result is
//! the conjunction of all stages and does not depend on their order.

use crate::access::domain::{SourcePolicy, TeamRoster, ViewFilter, Viewer, VisibilityQuery};
use crate::task::domain::{RoutePolicy, Task};

/// One predicate of the visibility pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Tombstoned tasks are never listed.
    Listing,
    /// Owner or assignment match, unless the team override is active.
    Ownership,
    /// Team membership, only while the team override is active.
    TeamScope,
    /// Role default route or a dual-route work type, unless the team
    /// override is active.
    Routing,
    /// Explicit source filter or the role's default.
    Source,
    /// Optional view narrowing.
    View,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Listing,
        Self::Ownership,
        Self::TeamScope,
        Self::Routing,
        Self::Source,
        Self::View,
    ];
}

/// A viewer's visibility request.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Who is looking.
    pub viewer: &'a Viewer,
    /// What they asked for.
    pub query: &'a VisibilityQuery,
    /// The viewer's team roster, when known.
    pub roster: Option<&'a TeamRoster>,
}

impl<'a> AccessRequest<'a> {
    /// Creates a request.
    #[must_use]
    pub const fn new(
        viewer: &'a Viewer,
        query: &'a VisibilityQuery,
        roster: Option<&'a TeamRoster>,
    ) -> Self {
        Self {
            viewer,
            query,
            roster,
        }
    }

    /// Returns the roster when a team view is requested and the roster
    /// belongs to the viewer's team.
    #[must_use]
    pub fn team_override(&self) -> Option<&'a TeamRoster> {
        if !self.query.team_view {
            return None;
        }
        let team_id = self.viewer.team_id?;
        self.roster.filter(|roster| roster.team_id() == team_id)
    }
}

/// Applies routing and source policies to candidate task lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessFilter {
    routes: RoutePolicy,
    sources: SourcePolicy,
}

impl AccessFilter {
    /// Creates a filter from injected policies.
    #[must_use]
    pub const fn new(routes: RoutePolicy, sources: SourcePolicy) -> Self {
        Self { routes, sources }
    }

    /// Returns the visible subset of `tasks`, preserving order.
    #[must_use]
    pub fn filter(&self, request: &AccessRequest<'_>, tasks: Vec<Task>) -> Vec<Task> {
        self.filter_in_order(request, tasks, &Stage::ALL)
    }

    /// Applies `stages` one after another.
    #[must_use]
    pub fn filter_in_order(
        &self,
        request: &AccessRequest<'_>,
        tasks: Vec<Task>,
        stages: &[Stage],
    ) -> Vec<Task> {
        stages.iter().fold(tasks, |mut remaining, stage| {
            remaining.retain(|task| self.admits(*stage, request, task));
            remaining
        })
    }

    /// Returns whether `task` passes every stage.
    #[must_use]
    pub fn is_visible(&self, request: &AccessRequest<'_>, task: &Task) -> bool {
        Stage::ALL
            .iter()
            .all(|stage| self.admits(*stage, request, task))
    }

    /// Returns whether `task` passes `stage`.
    #[must_use]
    pub fn admits(&self, stage: Stage, request: &AccessRequest<'_>, task: &Task) -> bool {
        let team = request.team_override();
        match stage {
            Stage::Listing => !task.is_tombstoned(),
            Stage::Ownership => team.is_some() || owned_or_involved(request.viewer, task),
            Stage::TeamScope => team.is_none_or(|roster| in_team(roster, task)),
            Stage::Routing => team.is_some() || self.routed_to(request.viewer, task),
            Stage::Source => request
                .query
                .source
                .unwrap_or_else(|| self.sources.default_for(&request.viewer.role))
                .matches(task),
            Stage::View => request
                .query
                .view
                .is_none_or(|view| view_matches(view, request.viewer, task)),
        }
    }

    fn routed_to(&self, viewer: &Viewer, task: &Task) -> bool {
        let routing = task.metadata().routing;
        routing.route_to == self.routes.default_route(&viewer.role)
            || self.routes.is_dual_route(routing.work_type)
    }
}

fn owned_or_involved(viewer: &Viewer, task: &Task) -> bool {
    task.owner_id() == viewer.local_id
        || viewer
            .platform_handle
            .as_ref()
            .is_some_and(|handle| task.metadata().assignment.involves(handle))
}

fn in_team(roster: &TeamRoster, task: &Task) -> bool {
    roster.has_member(task.owner_id())
        || task
            .metadata()
            .assignment
            .handles()
            .any(|handle| roster.knows_handle(handle))
}

fn view_matches(view: ViewFilter, viewer: &Viewer, task: &Task) -> bool {
    let assignment = &task.metadata().assignment;
    let handle = viewer.platform_handle.as_ref();
    let is_assignee = handle.is_some_and(|value| assignment.assignee.as_ref() == Some(value));
    match view {
        ViewFilter::AssignedToMe => is_assignee,
        ViewFilter::AssignedByMe => {
            handle.is_some_and(|value| assignment.assignor.as_ref() == Some(value))
        }
        ViewFilter::MyTasks => task.owner_id() == viewer.local_id || is_assignee,
    }
}
