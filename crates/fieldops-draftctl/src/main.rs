//! fieldops-draftctl: edit, save and submit field report drafts from a shell

use std::path::Path;

use clap::Parser;
use tracing::info;

use fieldops_draftctl::cli::{self, Commands};
use fieldops_draftctl::config::Config;

#[derive(Parser)]
#[command(name = "fieldops-draftctl")]
#[command(about = "Edit, save and submit field report drafts")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "draftctl.toml")]
    config: String,

    /// Base URL of the platform API (overrides config file)
    #[arg(long, env = "FIELDOPS_API_URL")]
    api_url: Option<String>,

    /// Bearer token (overrides config file)
    #[arg(long, env = "FIELDOPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fieldops_drafts=info".parse()?)
                .add_directive("fieldops_draftctl=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("Config file: {}", cli.config);

    let mut config = Config::load(Path::new(&cli.config))?;
    config.apply_overrides(cli.api_url, cli.token);

    match cli::execute(&config, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
