//! Who is looking, and which team they belong to.

use crate::task::domain::{PlatformHandle, Role, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Team identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(Uuid);

impl TeamId {
    /// Creates a new random team identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user a visibility decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// Local identity, compared against task owners.
    pub local_id: UserId,
    /// Platform handle, compared against assignment fields.
    pub platform_handle: Option<PlatformHandle>,
    /// Role, used for default routing and source policies.
    pub role: Role,
    /// Team membership, if any.
    pub team_id: Option<TeamId>,
}

impl Viewer {
    /// Creates a viewer without a handle or team.
    #[must_use]
    pub const fn new(local_id: UserId, role: Role) -> Self {
        Self {
            local_id,
            platform_handle: None,
            role,
            team_id: None,
        }
    }

    /// Sets the platform handle.
    #[must_use]
    pub fn with_handle(mut self, handle: PlatformHandle) -> Self {
        self.platform_handle = Some(handle);
        self
    }

    /// Sets the team.
    #[must_use]
    pub const fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

/// Members of one team and every handle each of them is known by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
    team_id: TeamId,
    members: BTreeMap<UserId, BTreeSet<PlatformHandle>>,
}

impl TeamRoster {
    /// Creates an empty roster.
    #[must_use]
    pub const fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            members: BTreeMap::new(),
        }
    }

    /// Adds a member and their handles. Repeated calls merge handles.
    #[must_use]
    pub fn with_member(
        mut self,
        member: UserId,
        handles: impl IntoIterator<Item = PlatformHandle>,
    ) -> Self {
        self.members.entry(member).or_default().extend(handles);
        self
    }

    /// Returns the team this roster describes.
    #[must_use]
    pub const fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Returns whether `user` is a member.
    #[must_use]
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.contains_key(&user)
    }

    /// Returns whether `handle` belongs to any member.
    #[must_use]
    pub fn knows_handle(&self, handle: &PlatformHandle) -> bool {
        self.members.values().any(|handles| handles.contains(handle))
    }
}
