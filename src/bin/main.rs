use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use tessera_app::{init_logging, NodeConfig, TesseraApp};
use tessera_protocol::{default_protocols, new_protocol_keeper};

#[derive(Parser)]
#[command(name = "tesserad")]
#[command(about = "Tessera node", long_about = None)]
struct Cli {
    /// TOML node configuration, layered under TESSERA_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the protocol versions compiled into this binary
    Protocols,

    /// Open the node store and report the active protocol and any pending upgrade
    Status,

    /// Print the active protocol's genesis export as JSON
    Export,
}

fn open_app(config: &NodeConfig) -> Result<TesseraApp> {
    let db = config
        .open_database()
        .with_context(|| format!("cannot open database at {}", config.db_path().display()))?;
    let app = TesseraApp::new(config.chain_id.clone(), db).context("node refused to start")?;
    Ok(app)
}

fn run(cli: Cli, config: NodeConfig) -> Result<()> {
    match cli.command {
        Commands::Protocols => {
            let keeper = new_protocol_keeper();
            for protocol in default_protocols(&keeper) {
                println!(
                    "version {}: tx codec {}, {} key-spaces",
                    protocol.version(),
                    protocol.codec().name(),
                    protocol.kv_store_keys().len()
                );
            }
        }
        Commands::Status => {
            let app = open_app(&config)?;
            println!("chain id:          {}", app.chain_id());
            println!("protocol version:  {}", app.current_version());
            println!("last height:       {}", app.last_block_height());
            println!("app hash:          {}", app.last_commit_id().hash_hex());
            match app.upgrade_config()? {
                Some(pending) => println!("pending upgrade:   {} (proposal {})", pending.protocol_def, pending.proposal_id),
                None => println!("pending upgrade:   none"),
            }
            let failed = app.last_failed_version()?;
            if failed > 0 {
                println!("last failed:       {}", failed);
            }
        }
        Commands::Export => {
            let mut app = open_app(&config)?;
            let genesis = app.export_genesis()?;
            println!("{}", serde_json::to_string_pretty(&genesis)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref()).context("invalid node configuration")?;
    init_logging(&config.log_level);
    info!("Using home {} for chain {}", config.home.display(), config.chain_id);

    if let Err(err) = run(cli, config) {
        error!("{:#}", err);
        return Err(err);
    }
    Ok(())
}
