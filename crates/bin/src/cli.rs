//! CLI argument definitions for the BookIt binary.

use std::path::PathBuf;

use bookit::{FeatureConfig, reorder::ReorderScope};
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

/// Built-in feature presets
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Feature {
    /// Resource catalogue (categories and bookable resources)
    Resources,
    /// Checklist (categories and checklist items with per-category order)
    Checklist,
}

/// Level of the hierarchy a reorder applies to
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scope {
    Categories,
    Items,
}

impl From<Scope> for ReorderScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Categories => ReorderScope::Categories,
            Scope::Items => ReorderScope::Items,
        }
    }
}

/// BookIt state tooling
#[derive(Parser, Debug)]
#[command(name = "bookit")]
#[command(about = "BookIt: inspect page snapshots, replay updates and call the AJAX service")]
#[command(version)]
pub struct Cli {
    /// Feature preset to use when no configuration file is given
    #[arg(long, global = true, default_value = "resources", env = "BOOKIT_FEATURE")]
    pub feature: Feature,

    /// JSON feature configuration, overrides --feature
    #[arg(long, global = true, env = "BOOKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a page snapshot and print the category/item tree
    Inspect(InspectArgs),
    /// Apply a drop to a snapshot and print the resulting change events
    Reorder(ReorderArgs),
    /// Replay a form result against a snapshot
    Apply(ApplyArgs),
    /// Call an AJAX service method on a live site
    Call(CallArgs),
}

/// Arguments for the inspect command
#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Page snapshot (JSON)
    pub snapshot: PathBuf,

    /// Only show entries visible for this room
    #[arg(long)]
    pub room: Option<i64>,

    /// Only show entries visible for this role
    #[arg(long)]
    pub role: Option<i64>,
}

/// Arguments for the reorder command
#[derive(clap::Args, Debug)]
pub struct ReorderArgs {
    /// Page snapshot (JSON)
    pub snapshot: PathBuf,

    /// Entity to move
    #[arg(long)]
    pub id: i64,

    /// Sibling to place it after; omitted appends at the end
    #[arg(long)]
    pub after: Option<i64>,

    /// Destination category, for items
    #[arg(long)]
    pub parent: Option<i64>,

    #[arg(long, default_value = "items")]
    pub scope: Scope,
}

/// Arguments for the apply command
#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    /// Page snapshot (JSON)
    pub snapshot: PathBuf,

    /// Form result (JSON), canonical update list or legacy result object
    pub updates: PathBuf,
}

/// Arguments for the call command
#[derive(clap::Args, Debug)]
pub struct CallArgs {
    /// Web service method name
    pub method: String,

    /// Method arguments as a JSON object
    #[arg(default_value = "{}")]
    pub args: String,

    /// Site root
    #[arg(long, env = "BOOKIT_WWWROOT")]
    pub wwwroot: Url,

    /// Session key of a logged in session
    #[arg(long, env = "BOOKIT_SESSKEY")]
    pub sesskey: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

impl Cli {
    /// Resolve the feature configuration from --config or --feature
    pub fn feature_config(&self) -> Result<FeatureConfig, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                Ok(FeatureConfig::from_json(&json)?)
            }
            None => Ok(match self.feature {
                Feature::Resources => FeatureConfig::resources(),
                Feature::Checklist => FeatureConfig::checklist(),
            }),
        }
    }
}
