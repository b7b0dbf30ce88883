use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("bookit=info".parse()?))
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from_flag(cli.json);
    let config = cli.feature_config()?;
    tracing::debug!(feature = %config.name, "Resolved feature configuration");

    match &cli.command {
        Commands::Inspect(args) => commands::inspect::run(args, &config, format),
        Commands::Reorder(args) => commands::reorder::run(args, &config, format),
        Commands::Apply(args) => commands::apply::run(args, &config, format),
        Commands::Call(args) => commands::call::run(args, format).await,
    }
}
