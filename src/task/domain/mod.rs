//! Domain model for reconciled tasks.
//!
//! Tasks are either purely local or linked to an external tracker issue
//! through an [`ExternalRef`]. Infrastructure concerns stay outside of the
//! domain boundary.

mod error;
mod external;
mod ids;
mod metadata;
mod routing;
mod task;

pub use error::{ParseTaskValueError, TaskDomainError};
pub use external::{ExternalLink, ExternalRef, TrackerSource};
pub use ids::{PlatformHandle, TaskId, UserId};
pub use metadata::{Assignment, Priority, TaskMetadata, TaskPatch, TrackedField};
pub use routing::{Role, Route, RoutePolicy, Routing, WorkType};
pub use task::{PersistedTaskData, Task, TaskLifecycle};
