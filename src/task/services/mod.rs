//! Application services for local task lifecycle orchestration.

mod lifecycle;

pub use lifecycle::{
    ConflictPolicy, CreateTaskRequest, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService,
};
