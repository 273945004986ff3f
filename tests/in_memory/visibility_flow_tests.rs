//! Synced and local tasks seen through the access filter.

use super::helpers::{Stack, handle, stack, titles, viewer};
use rstest::rstest;
use taskbridge::access::domain::{
    SourceFilter, TeamId, TeamRoster, Viewer, ViewFilter, VisibilityQuery,
};
use taskbridge::sync::domain::SyncScope;
use taskbridge::task::{
    domain::{Role, UserId, WorkType},
    services::CreateTaskRequest,
};
use taskbridge::tracker::domain::RemoteIssue;

fn jira_issue(remote_id: &str, summary: &str, assignee: &str) -> RemoteIssue {
    RemoteIssue::new(remote_id, format!("OPS-{remote_id}"), summary)
        .with_status("In Progress")
        .with_assignee(assignee)
        .with_reporter("lead")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn developers_see_their_synced_issues(stack: Stack) -> Result<(), eyre::Report> {
    let dev = viewer("developer", "dev")?;
    let scope = SyncScope::assigned_to(dev.local_id, handle("dev")?);
    stack.script(&scope, [jira_issue("1", "Fix build", "dev")])?;

    let report = stack.engine.reconcile(&scope).await?;
    let visible = stack
        .access
        .list_visible(&dev, &VisibilityQuery::default(), None)
        .await?;

    eyre::ensure!(report.created == 1, "unexpected report {report:?}");
    eyre::ensure!(titles(&visible) == ["Fix build"], "saw {:?}", titles(&visible));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn synced_tasks_stay_off_other_tracks(stack: Stack) -> Result<(), eyre::Report> {
    let sales = viewer("sales", "seller")?;
    let scope = SyncScope::assigned_to(sales.local_id, handle("seller")?);
    stack.script(&scope, [jira_issue("2", "Review contract", "seller")])?;
    stack.engine.reconcile(&scope).await?;
    stack
        .lifecycle
        .create_local(CreateTaskRequest::new(
            sales.local_id,
            sales.role.clone(),
            "Call prospect",
            WorkType::Outreach,
        ))
        .await?;
    stack
        .lifecycle
        .create_local(CreateTaskRequest::new(
            sales.local_id,
            Role::new("developer"),
            "Team sync",
            WorkType::Calendar,
        ))
        .await?;

    let visible = stack
        .access
        .list_visible(&sales, &VisibilityQuery::default(), None)
        .await?;

    eyre::ensure!(
        titles(&visible) == ["Call prospect", "Team sync"],
        "saw {:?}",
        titles(&visible)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn configured_source_defaults_apply_per_role(stack: Stack) -> Result<(), eyre::Report> {
    let auditor = Viewer::new(UserId::new(), Role::new("auditor")).with_handle(handle("audit")?);
    let scope = SyncScope::assigned_to(auditor.local_id, handle("audit")?);
    stack.script(&scope, [jira_issue("3", "Check ledger", "audit")])?;
    stack.engine.reconcile(&scope).await?;
    stack
        .lifecycle
        .create_local(CreateTaskRequest::new(
            auditor.local_id,
            auditor.role.clone(),
            "Local note",
            WorkType::Task,
        ))
        .await?;

    let defaults = stack
        .access
        .list_visible(&auditor, &VisibilityQuery::default(), None)
        .await?;
    let local_only = stack
        .access
        .list_visible(
            &auditor,
            &VisibilityQuery::default().with_source(SourceFilter::Local),
            None,
        )
        .await?;

    eyre::ensure!(titles(&defaults) == ["Check ledger"], "saw {:?}", titles(&defaults));
    eyre::ensure!(titles(&local_only) == ["Local note"], "saw {:?}", titles(&local_only));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn team_view_widens_to_team_members(stack: Stack) -> Result<(), eyre::Report> {
    let team = TeamId::new();
    let lead = viewer("developer", "lead")?.with_team(team);
    let member = viewer("developer", "member")?;
    let outsider = viewer("developer", "outsider")?;
    let roster = TeamRoster::new(team)
        .with_member(lead.local_id, [handle("lead")?])
        .with_member(member.local_id, [handle("member")?]);
    for (owner, name, remote_id) in [(&member, "member", "10"), (&outsider, "outsider", "11")] {
        let scope = SyncScope::assigned_to(owner.local_id, handle(name)?);
        stack.script(&scope, [jira_issue(remote_id, &format!("Work for {name}"), name)])?;
        stack.engine.reconcile(&scope).await?;
    }

    let own_view = stack
        .access
        .list_visible(&lead, &VisibilityQuery::default(), Some(&roster))
        .await?;
    let team_view = stack
        .access
        .list_visible(&lead, &VisibilityQuery::team(), Some(&roster))
        .await?;
    let assigned_to_member = stack
        .access
        .list_visible(
            &member,
            &VisibilityQuery::default().with_view(ViewFilter::AssignedToMe),
            None,
        )
        .await?;

    eyre::ensure!(own_view.is_empty(), "saw {:?}", titles(&own_view));
    eyre::ensure!(titles(&team_view) == ["Work for member"], "saw {:?}", titles(&team_view));
    eyre::ensure!(
        titles(&assigned_to_member) == ["Work for member"],
        "saw {:?}",
        titles(&assigned_to_member)
    );
    Ok(())
}
