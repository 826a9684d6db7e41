use anyhow::Result;
use clap::{Parser, Subcommand};

use custody_bootstrap::logging::{init_tracing, load_config};

#[derive(Parser, Debug)]
#[command(name = "custody-server")]
#[command(about = "Shipment custody lifecycle server", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run the auto-approval engine once and exit
    AutoApprove,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).await?;
    let _guard = init_tracing(&config);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => custody_bootstrap::run_standalone(&config).await,
        Command::AutoApprove => {
            let report = custody_bootstrap::run_auto_approval_once(&config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
