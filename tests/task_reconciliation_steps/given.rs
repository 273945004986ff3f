//! Given steps for task reconciliation BDD scenarios.

use super::world::{ReconciliationWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use taskbridge::task::domain::TaskPatch;
use taskbridge::tracker::{domain::RemoteIssue, ports::TrackerClientError};

#[given(r#"the tracker assigns issue {issue_id:u64} "{summary}" with status "{status}" to "{handle}""#)]
fn tracker_assigns_issue(
    world: &mut ReconciliationWorld,
    issue_id: u64,
    summary: String,
    status: String,
    handle: String,
) {
    let remote_id = issue_id.to_string();
    let issue = RemoteIssue::new(remote_id.clone(), format!("OPS-{issue_id}"), summary)
        .with_status(status)
        .with_assignee(handle.clone())
        .with_reporter("pm");
    world
        .remote
        .entry(handle)
        .or_default()
        .insert(remote_id, issue);
}

#[given(r#"the scope for "{handle}" has been reconciled"#)]
fn scope_has_been_reconciled(
    world: &mut ReconciliationWorld,
    handle: String,
) -> Result<(), eyre::Report> {
    world.publish(&handle)?;
    let scope = world.scope_for(&handle)?;
    run_async(world.engine.reconcile(&scope)).wrap_err("reconcile during scenario setup")?;
    Ok(())
}

#[given("issue {issue_id:u64} is no longer returned by the tracker")]
fn issue_no_longer_returned(world: &mut ReconciliationWorld, issue_id: u64) {
    let remote_id = issue_id.to_string();
    for issues in world.remote.values_mut() {
        issues.remove(&remote_id);
    }
}

#[given(r#"the task for issue {issue_id:u64} is renamed locally to "{title}""#)]
fn task_renamed_locally(
    world: &mut ReconciliationWorld,
    issue_id: u64,
    title: String,
) -> Result<(), eyre::Report> {
    let task = world.task_for(issue_id)?;
    run_async(
        world
            .lifecycle
            .edit(task.id(), &TaskPatch::new().with_title(title)),
    )
    .wrap_err("rename task locally")?;
    Ok(())
}

#[given("the tracker is unavailable")]
fn tracker_unavailable(world: &mut ReconciliationWorld) -> Result<(), eyre::Report> {
    world
        .tracker
        .set_fetch_failure(Some(TrackerClientError::RateLimited))?;
    Ok(())
}
