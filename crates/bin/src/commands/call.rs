//! Call command - invokes one AJAX service method and prints its data.

use bookit::services::{HttpRemote, RemoteConfig, RemoteService};

use crate::cli::CallArgs;
use crate::output::OutputFormat;

/// Run the call command
pub async fn run(args: &CallArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let call_args: serde_json::Value = serde_json::from_str(&args.args)?;
    if !call_args.is_object() {
        return Err("method arguments must be a JSON object".into());
    }

    let mut config = RemoteConfig::new(args.wwwroot.clone(), args.sesskey.clone());
    config.timeout = std::time::Duration::from_secs(args.timeout);
    let remote = HttpRemote::new(config)?;

    let data = remote.call_one(&args.method, call_args).await?;
    match format {
        OutputFormat::Human => println!("{}", serde_json::to_string_pretty(&data)?),
        OutputFormat::Json => println!("{}", serde_json::to_string(&data)?),
    }
    Ok(())
}
