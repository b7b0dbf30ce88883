//! Apply command - replays a form result against a snapshot.

use bookit::{FeatureConfig, Store, form::FormSubmission};

use crate::cli::ApplyArgs;
use crate::output::{OutputFormat, print_changes};

/// Run the apply command
pub fn run(
    args: &ApplyArgs,
    config: &FeatureConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::new(super::load(&args.snapshot, config)?);

    let raw = std::fs::read_to_string(&args.updates)?;
    let payload: serde_json::Value = serde_json::from_str(&raw)?;
    let updates = FormSubmission::parse(payload)?.into_updates(&config.items)?;
    tracing::info!(updates = updates.len(), "Replaying form result");

    let changes = store.process_updates(config, &updates)?;
    print_changes(&changes, format)?;
    Ok(())
}
