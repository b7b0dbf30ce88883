//! Reorder command - applies one drop to a snapshot offline and prints what
//! watchers would have been told.

use bookit::{
    FeatureConfig, Store,
    reorder::{ReorderOutcome, ReorderRequest, ReorderScope, apply_reorder},
};

use crate::cli::ReorderArgs;
use crate::output::{OutputFormat, print_changes};

/// Run the reorder command
pub fn run(
    args: &ReorderArgs,
    config: &FeatureConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::new(super::load(&args.snapshot, config)?);
    let request = ReorderRequest {
        id: args.id,
        target_id: args.after,
        target_parent_id: args.parent,
    };
    let scope = ReorderScope::from(args.scope);

    let mut guard = store.begin_write()?;
    let outcome = apply_reorder(&mut guard, config, scope, &request);
    match &outcome {
        ReorderOutcome::Moved(moved) => {
            tracing::info!(id = request.id, order = ?moved.order, "Drop applied");
            let changes = guard.commit();
            print_changes(&changes, format)?;
        }
        ReorderOutcome::Unchanged => {
            guard.rollback();
            tracing::info!(id = request.id, "Drop leaves the order unchanged");
            print_changes(&Default::default(), format)?;
        }
        ReorderOutcome::MissingEntity => {
            guard.rollback();
            return Err(format!("no {scope:?} entry with id {}", request.id).into());
        }
        ReorderOutcome::MissingParent(parent) => {
            guard.rollback();
            return Err(format!("no category with id {parent}").into());
        }
    }

    Ok(())
}
