//! Then steps for task reconciliation BDD scenarios.

use super::world::ReconciliationWorld;
use rstest_bdd_macros::then;
use taskbridge::sync::{domain::SyncReport, services::SyncError};

fn last_report(world: &ReconciliationWorld) -> Result<SyncReport, eyre::Report> {
    match world.last_result.as_ref() {
        Some(Ok(report)) => Ok(*report),
        Some(Err(err)) => Err(eyre::eyre!("reconciliation failed: {err}")),
        None => Err(eyre::eyre!("no reconciliation pass ran")),
    }
}

#[then("the pass created {created:usize} tasks and tombstoned {tombstoned:usize}")]
fn pass_created_and_tombstoned(
    world: &ReconciliationWorld,
    created: usize,
    tombstoned: usize,
) -> Result<(), eyre::Report> {
    let report = last_report(world)?;
    eyre::ensure!(
        report.created == created,
        "expected {created} created, report was {report:?}"
    );
    eyre::ensure!(
        report.tombstoned == tombstoned,
        "expected {tombstoned} tombstoned, report was {report:?}"
    );
    Ok(())
}

#[then("the pass revived {revived:usize} task")]
fn pass_revived(world: &ReconciliationWorld, revived: usize) -> Result<(), eyre::Report> {
    let report = last_report(world)?;
    eyre::ensure!(
        report.revived == revived,
        "expected {revived} revived, report was {report:?}"
    );
    Ok(())
}

#[then("the pass fails with a fetch error")]
fn pass_fails_with_fetch_error(world: &ReconciliationWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no reconciliation pass ran"))?;
    if !matches!(result, Err(SyncError::Fetch(_))) {
        return Err(eyre::eyre!("expected a fetch error, got {result:?}"));
    }
    Ok(())
}

#[then("the task for issue {issue_id:u64} is open")]
fn task_is_open(world: &ReconciliationWorld, issue_id: u64) -> Result<(), eyre::Report> {
    let task = world.task_for(issue_id)?;
    eyre::ensure!(
        !task.is_completed() && !task.is_tombstoned(),
        "expected an open task, lifecycle is {:?}",
        task.lifecycle()
    );
    Ok(())
}

#[then("the task for issue {issue_id:u64} is completed")]
fn task_is_completed(world: &ReconciliationWorld, issue_id: u64) -> Result<(), eyre::Report> {
    let task = world.task_for(issue_id)?;
    eyre::ensure!(
        task.is_completed() && !task.is_tombstoned(),
        "expected a completed task, lifecycle is {:?}",
        task.lifecycle()
    );
    Ok(())
}

#[then("the task for issue {issue_id:u64} is tombstoned")]
fn task_is_tombstoned(world: &ReconciliationWorld, issue_id: u64) -> Result<(), eyre::Report> {
    let task = world.task_for(issue_id)?;
    eyre::ensure!(
        task.is_tombstoned(),
        "expected a tombstoned task, lifecycle is {:?}",
        task.lifecycle()
    );
    Ok(())
}

#[then(r#"the task for issue {issue_id:u64} has title "{title}""#)]
fn task_has_title(
    world: &ReconciliationWorld,
    issue_id: u64,
    title: String,
) -> Result<(), eyre::Report> {
    let task = world.task_for(issue_id)?;
    eyre::ensure!(
        task.title() == title,
        "expected title {title:?}, found {:?}",
        task.title()
    );
    Ok(())
}
