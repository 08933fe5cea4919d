//! `zeroex`: command-line front end for the ExchangeProxy simulator.
//!
//! # Commands
//! ```text
//! zeroex migrate   [--config <path.json>] [--owner <addr>] [--json]
//! zeroex decode    --data <hex> [--json]
//! zeroex selectors [--config <path.json>] [--json]
//! ```

use alloy_primitives::{address, Address};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use zeroex_core::{RevertDecoder, SimulatorConfig};

mod cmd_migrate;
mod logging;

/// Account that sends every deployment unless `--deployer` says otherwise.
const DEFAULT_DEPLOYER: Address = address!("00000000000000000000000000000000000de910");

#[derive(Parser)]
#[command(
    name = "zeroex",
    about = "ExchangeProxy simulator: migrate a proxy, decode reverts, list selectors",
    version
)]
struct Cli {
    /// Simulator config (JSON); defaults apply to missing fields
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log at debug level regardless of the config
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a fully migrated proxy and print its features and event log
    Migrate {
        /// Deploying account (0x-prefixed)
        #[arg(long)]
        deployer: Option<String>,
        /// Final owner of the proxy; defaults to the deployer
        #[arg(long)]
        owner: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode revert data into a rich error and its causes
    Decode {
        /// Revert data (0x-prefixed hex)
        #[arg(long)]
        data: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the function selectors registered on a freshly migrated proxy
    Selectors {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimulatorConfig::from_json_file(path).with_context(|| format!("load config '{path}'"))?,
        None => SimulatorConfig::default(),
    };
    if cli.verbose {
        config.log.level = "debug".into();
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Migrate { deployer, owner, json } => {
            let deployer = parse_address(deployer.as_deref(), DEFAULT_DEPLOYER)?;
            let owner = parse_address(owner.as_deref(), deployer)?;
            cmd_migrate::run(&config, deployer, owner, json)
        }
        Commands::Decode { data, json } => cmd_decode(&data, json),
        Commands::Selectors { json } => cmd_selectors(&config, json),
    }
}

fn parse_address(raw: Option<&str>, default: Address) -> Result<Address> {
    match raw {
        Some(raw) => raw.parse().with_context(|| format!("invalid address '{raw}'")),
        None => Ok(default),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_decode(data: &str, as_json: bool) -> Result<()> {
    let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).context("invalid revert data hex")?;
    let decoded = RevertDecoder::new().decode(&bytes);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }
    println!("{decoded}");
    let root = decoded.root_cause();
    if let Some(suggestion) = &root.suggestion {
        println!();
        println!("Hint: {suggestion}");
    }
    Ok(())
}

fn cmd_selectors(config: &SimulatorConfig, as_json: bool) -> Result<()> {
    let deployment = cmd_migrate::deploy(config, DEFAULT_DEPLOYER, DEFAULT_DEPLOYER)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&deployment.functions)?);
        return Ok(());
    }
    for f in &deployment.functions {
        println!("{}  {}", f.selector, f.signature);
    }
    Ok(())
}
