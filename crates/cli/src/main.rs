//! mbingen - mbinbridge command line
//!
//! Works from schema snapshots (JSON dumps of the host's type table), so no
//! runtime host is needed:
//!
//! - `emit` - write Rust bindings for a snapshot
//! - `order` - print the declaration order and any dependency cycles
//! - `pack` - pack a directory with the configured archive tool
//! - `init-config` - write a default `mbinbridge.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mbinbridge_core::config::{self, BridgeConfig};
use mbinbridge_core::schema::{DependencyGraph, EmitOptions, Emitter, SchemaSet};
use mbinbridge_core::{generate_from_snapshot, ArchiveTool};

/// Environment variable holding the log filter
const LOG_ENV: &str = "MBINBRIDGE_LOG";

#[derive(Parser)]
#[command(name = "mbingen")]
#[command(about = "Rust bindings for the MBIN asset library", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: $MBINBRIDGE_CONFIG or ./mbinbridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless MBINBRIDGE_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings from a schema snapshot
    Emit {
        /// Schema snapshot (JSON)
        #[arg(short, long)]
        schema: PathBuf,
        /// Output file (default: codegen.output from the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print declarations in dependency order
    Order {
        /// Schema snapshot (JSON)
        #[arg(short, long)]
        schema: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pack a directory into an archive
    Pack {
        /// Directory to pack
        dir: PathBuf,
        /// Archive to create
        output: PathBuf,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_file = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };

    match cli.command {
        Commands::Emit { schema, out } => {
            let (config, base) = load_config(&config_file)?;
            let output = out.unwrap_or_else(|| config::resolve(&base, &config.codegen.output));
            let report = generate_from_snapshot(&schema, &config.codegen, &output)
                .with_context(|| format!("generating bindings from {}", schema.display()))?;

            println!(
                "Wrote {} records, {} enums to {}",
                report.records,
                report.enums,
                report.output.display()
            );
            for cycle in &report.cycles {
                println!("Cycle: {}", cycle.join(" <-> "));
            }
            if !report.unmapped.is_empty() {
                println!("Unmapped types: {}", report.unmapped.join(", "));
            }
        }

        Commands::Order { schema, json } => {
            let (config, _) = load_config(&config_file)?;
            let snapshot = SchemaSet::load(&schema)
                .with_context(|| format!("loading {}", schema.display()))?;
            let emitter = Emitter::new(&snapshot, &EmitOptions::from(&config.codegen));
            let outcome = DependencyGraph::build(emitter.nodes()).sort();

            if json {
                let value = serde_json::json!({
                    "order": outcome.order,
                    "cycles": outcome.cycles,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for name in &outcome.order {
                    println!("{name}");
                }
                for cycle in &outcome.cycles {
                    eprintln!("Cycle: {}", cycle.join(" <-> "));
                }
            }
        }

        Commands::Pack { dir, output } => {
            let (config, _) = load_config(&config_file)?;
            let tool = ArchiveTool::from_config(&config.pak);
            let packed = tool
                .pack_directory(&dir, &output)
                .with_context(|| format!("packing {}", dir.display()))?;
            println!("Packed {} into {}", dir.display(), packed.display());
        }

        Commands::InitConfig { force } => {
            if config_file.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_file.display()
                );
            }
            BridgeConfig::default().save_to(&config_file)?;
            println!("Wrote {}", config_file.display());
        }
    }

    Ok(())
}

/// Load the config (creating it if missing) and the directory its paths are relative to
fn load_config(path: &Path) -> anyhow::Result<(BridgeConfig, PathBuf)> {
    let config = BridgeConfig::load_from(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    let base = config::base_dir(path)?;
    Ok((config, base))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
