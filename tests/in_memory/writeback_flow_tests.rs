//! Local edits pushed to the tracker and read back by reconciliation.

use super::helpers::{Stack, handle, stack};
use rstest::rstest;
use taskbridge::sync::domain::SyncScope;
use taskbridge::task::domain::{Priority, TaskPatch, TrackedField, UserId};
use taskbridge::tracker::{
    adapters::memory::TrackerWrite,
    domain::{RemoteIssue, StatusCategory},
};
use std::collections::BTreeSet;

fn scope() -> Result<SyncScope, eyre::Report> {
    Ok(SyncScope::assigned_to(UserId::new(), handle("dev")?))
}

fn issue() -> RemoteIssue {
    RemoteIssue::new("77", "OPS-77", "Rotate keys")
        .with_status("In Progress")
        .with_priority("Major")
        .with_assignee("dev")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pushed_status_is_stable_across_the_next_pass(stack: Stack) -> Result<(), eyre::Report> {
    let scope = scope()?;
    stack.script(&scope, [issue()])?;
    stack.engine.reconcile(&scope).await?;
    let task = stack.linked("77").await?;

    let pushed = stack
        .writeback
        .push_status(task.id(), StatusCategory::Completed)
        .await?;
    let report = stack.engine.reconcile(&scope).await?;
    let after = stack.linked("77").await?;

    eyre::ensure!(pushed.is_completed(), "push should complete the task locally");
    eyre::ensure!(
        stack.tracker.writes()?
            == vec![TrackerWrite::Transition {
                key: "OPS-77".to_owned(),
                transition: "Closed".to_owned(),
            }],
        "unexpected tracker writes"
    );
    eyre::ensure!(report.changed == 0, "second pass changed tasks: {report:?}");
    eyre::ensure!(after.is_completed(), "task reopened by reconciliation");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pinned_edits_survive_until_released(stack: Stack) -> Result<(), eyre::Report> {
    let scope = scope()?;
    stack.script(&scope, [issue()])?;
    stack.engine.reconcile(&scope).await?;
    let task = stack.linked("77").await?;
    eyre::ensure!(task.metadata().priority == Priority::High, "Major maps to high");

    stack
        .lifecycle
        .edit(task.id(), &TaskPatch::new().with_priority(Priority::Low))
        .await?;
    let update = stack.writeback.push_fields(task.id()).await?;
    stack.engine.reconcile(&scope).await?;
    let pinned = stack.linked("77").await?;

    eyre::ensure!(update.priority.as_deref() == Some("Low"), "pushed {update:?}");
    eyre::ensure!(pinned.metadata().priority == Priority::Low, "pin was overwritten");

    stack
        .lifecycle
        .release_pins(task.id(), &BTreeSet::from([TrackedField::Priority]))
        .await?;
    stack.engine.reconcile(&scope).await?;
    let released = stack.linked("77").await?;

    eyre::ensure!(
        released.metadata().priority == Priority::High,
        "released pin should take the tracker value again"
    );
    Ok(())
}
