//! Subcommand implementations, one module per command.

pub mod apply;
pub mod call;
pub mod inspect;
pub mod reorder;

use std::path::Path;

use bookit::{
    FeatureConfig, State,
    bootstrap::{Snapshot, load_state},
};

/// Load a page snapshot file into a state
pub(crate) fn load(
    path: &Path,
    config: &FeatureConfig,
) -> Result<State, Box<dyn std::error::Error>> {
    let snapshot = Snapshot::from_path(path)?;
    let state = load_state(config, &snapshot)?;
    tracing::info!(path = %path.display(), feature = %config.name, "Loaded snapshot");
    Ok(state)
}
