//! usbip-vhci PnP simulator
//!
//! Assembles the virtual host controller's device stack in memory and drives
//! it with PnP requests.

use anyhow::{Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use common::{LOG_LEVELS, setup_logging};
use std::path::PathBuf;
use tracing::info;
use vhci::{Script, VhciConfig, VirtualStack};

#[derive(Parser, Debug)]
#[command(name = "vhci-pnp")]
#[command(author, version, about = "Simulate PnP requests against the virtual USB host controller")]
#[command(long_about = "
Builds the virtual USB host controller's device stack (root, controller,
hub and one virtual port per configured remote device) and replays PnP
request scripts against it.

EXAMPLES:
    # Show the assembled stack
    vhci-pnp show

    # Replay a request script
    vhci-pnp run eject.toml

    # Replay with machine-readable output
    vhci-pnp run eject.toml --json

CONFIGURATION:
    The simulator looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbip-vhci/vhci.toml
    3. /etc/usbip-vhci/vhci.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", value_parser = PossibleValuesParser::new(LOG_LEVELS))]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every node of the device stack
    Show,

    /// Replay a request script
    Run {
        /// Script file with [[step]] tables
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Print step reports as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = VhciConfig::default();
        let path = VhciConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        VhciConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        VhciConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.simulator.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbip-vhci PnP simulator v{}", env!("CARGO_PKG_VERSION"));

    let stack = VirtualStack::from_config(&config).context("Failed to assemble device stack")?;

    match args.command.unwrap_or(Command::Show) {
        Command::Show => show(&stack),
        Command::Run { script, json } => run(&stack, &script, json)?,
    }

    Ok(())
}

fn show(stack: &VirtualStack) {
    println!("{:<6} {:<4} {:<6} {:<8} {:<24} refs", "node", "id", "kind", "lower", "state");
    for node in stack.nodes() {
        let lower = node
            .lower()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<4} {:<6} {:<8} {:<24} {}",
            stack.name_of(node.id()),
            node.id().to_string(),
            node.kind().tag(),
            lower,
            format!("{:?}", node.current_state()),
            node.external_ref_count()
        );
    }
}

fn run(stack: &VirtualStack, path: &std::path::Path, json: bool) -> Result<()> {
    let script = Script::load(path)
        .with_context(|| format!("Failed to load script: {}", path.display()))?;
    info!("Replaying {} step(s) from {}", script.steps.len(), path.display());

    let reports = script.run(stack).context("Script aborted")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?
        );
    } else {
        for report in &reports {
            println!("{}", report);
        }
    }

    Ok(())
}
