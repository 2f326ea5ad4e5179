//! Keystone - Entry Point
//!
//! | Command | Description |
//! |---------|-------------|
//! | `keystone check` | Boot the application and report every configured resource |
//! | `keystone show-config` | Print the resolved configuration with secrets redacted |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keystone::{AppContext, Application, ConfigLoader};

/// Command line interface for Keystone
#[derive(Parser, Debug)]
#[command(name = "keystone")]
#[command(about = "Keystone - resource bootstrap and health checks")]
#[command(version)]
pub struct Cli {
    /// Configuration file (skips directory discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched for a configuration file (default: `KEYSTONE_CONFIG_DIR` or `.`)
    #[arg(short = 'd', long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start every configured resource and report its liveness
    Check,
    /// Print the resolved configuration as JSON, passwords redacted
    ShowConfig,
}

fn loader(cli: &Cli) -> ConfigLoader {
    let mut loader = ConfigLoader::new();
    if let Some(dir) = &cli.config_dir {
        loader = loader.with_config_dir(dir);
    }
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    loader
}

fn check(app: &AppContext) -> bool {
    let checks = app.check();
    if checks.is_empty() {
        println!("no resources configured");
    }
    for check in &checks {
        match &check.outcome {
            Ok(()) => println!(
                "{:<10} ok      {}",
                check.kind,
                check.target.as_deref().unwrap_or_default()
            ),
            Err(e) => println!("{:<10} FAILED  {e}", check.kind),
        }
    }
    checks.iter().all(keystone::ResourceCheck::is_ok)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let loader = loader(&cli);

    match cli.command {
        Command::Check => {
            let app = Application::configure()
                .with_system(loader)
                .run()
                .context("Application failed to start")?;
            let healthy = check(&app);
            app.shutdown();
            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::ShowConfig => {
            let loaded = loader.load().context("Failed to load configuration")?;
            let json = serde_json::to_string_pretty(&loaded.system.redacted())
                .context("Failed to render configuration")?;
            eprintln!("# {}", loaded.source.display());
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
