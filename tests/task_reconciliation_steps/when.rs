//! When steps for task reconciliation BDD scenarios.

use super::world::{ReconciliationWorld, run_async};
use rstest_bdd_macros::when;

#[when(r#"the scope for "{handle}" is reconciled"#)]
fn scope_is_reconciled(world: &mut ReconciliationWorld, handle: String) -> Result<(), eyre::Report> {
    world.publish(&handle)?;
    let scope = world.scope_for(&handle)?;
    world.last_result = Some(run_async(world.engine.reconcile(&scope)));
    Ok(())
}
