//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::DaemonConfig;
use crate::core::errors::Result;
use crate::daemon::event_loop;

/// telemetry_post_daemon — a post-stage telemetry pipeline daemon.
#[derive(Debug, Parser)]
#[command(name = "tpd", author, version, about = "Telemetry Post-Stage Daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon.
    Run(RunArgs),
    /// Configuration utilities.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Stay attached to the controlling terminal instead of daemonizing.
    ///
    /// Backgrounding/detaching from the controlling terminal is left to the
    /// process supervisor (systemd, launchd) per spec.md §1; this flag only
    /// controls whether startup/shutdown messages go to stderr.
    #[arg(long)]
    foreground: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Parse and validate the configuration file without starting the daemon.
    Check {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

/// Parse `argv` and dispatch to the selected subcommand.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Run(args) => run_daemon(args),
        Command::Config {
            command: ConfigCommand::Check { config },
        } => run_config_check(config.as_deref()),
    }
}

fn run_daemon(args: &RunArgs) -> Result<()> {
    let config = DaemonConfig::load(args.config.as_deref())?;
    if args.foreground {
        eprintln!("tpd: starting, staging_dir={}", config.paths.staging_dir.display());
    }
    event_loop::run(&config)?;
    if args.foreground {
        eprintln!("tpd: shut down cleanly");
    }
    Ok(())
}

fn run_config_check(path: Option<&std::path::Path>) -> Result<()> {
    let config = DaemonConfig::load(path)?;
    println!("config OK: {}", config.paths.config_file.display());
    println!("  staging_dir: {}", config.paths.staging_dir.display());
    println!("  spool_dir: {}", config.paths.spool_dir.display());
    println!("  retention_dir: {}", config.paths.retention_dir.display());
    println!("  rate_limit.enabled: {}", config.rate_limit.enabled);
    println!("  rate_limit.strategy: {}", config.rate_limit.strategy);
    Ok(())
}
