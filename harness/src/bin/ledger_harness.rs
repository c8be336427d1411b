use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_harness::address_book::AddressBook;
use ledger_harness::identity::NetworkType;
use ledger_harness::roster::{Role, Roster};
use ledger_harness::rpc::WsRepositoryFactory;
use ledger_harness::service::ProcessBootstrap;
use ledger_harness::telemetry::init_tracing;
use ledger_harness::{HarnessConfig, IntegrationHarness};
use tracing::info;
use url::Url;

#[derive(Parser)]
#[command(name = "ledger-harness", version, about = "Inspect and probe an integration test node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the identities bound to each test role.
    Roster {
        #[command(flatten)]
        target: TargetArgs,
        /// Numeric network type; defaults to the one recorded in the address book.
        #[arg(long)]
        network: Option<u8>,
    },
    /// Start a session, print the network constants and tear it down.
    Probe {
        #[command(flatten)]
        target: TargetArgs,
        /// JSON harness config; flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        api_url: Option<Url>,
        /// Start the node through the bootstrap toolchain first.
        #[arg(long)]
        start: bool,
        /// Leave a node started by `--start` running.
        #[arg(long)]
        keep_running: bool,
        #[arg(long, default_value = "symbol-bootstrap")]
        bootstrap: PathBuf,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Bootstrap output directory.
    #[arg(long)]
    target_dir: Option<PathBuf>,
    /// Use the REST development checkout.
    #[arg(long)]
    dev: bool,
}

impl TargetArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if self.dev {
            config.bootstrap_mode = ledger_harness::BootstrapMode::Dev;
        }
        if let Some(dir) = &self.target_dir {
            config.target_dir = Some(dir.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Roster { target, network } => print_roster(&target, network),
        Commands::Probe {
            target,
            config,
            api_url,
            start,
            keep_running,
            bootstrap,
        } => {
            let mut harness_config = match config {
                Some(path) => HarnessConfig::load(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => HarnessConfig::from_env()?,
            };
            target.apply(&mut harness_config);
            if api_url.is_some() {
                harness_config.api_url = api_url;
            }
            harness_config.start_service |= start;
            if keep_running {
                harness_config.stop_on_close = false;
            }
            probe(harness_config, bootstrap).await
        }
    }
}

fn print_roster(target: &TargetArgs, network: Option<u8>) -> Result<()> {
    let mut config = HarnessConfig::from_env()?;
    target.apply(&mut config);
    let book = AddressBook::load(config.target_dir())?;
    let network_type = match network {
        Some(code) => NetworkType::try_from(code)?,
        None => book.addresses.network_type.unwrap_or(NetworkType::PrivateTest),
    };
    let roster = Roster::derive(&book.private_keys, network_type)?;
    println!("network: {network_type}");
    for role in Role::ALL {
        let identity = roster.get(role);
        println!(
            "{:<18} {} {}",
            role.name(),
            identity.address(),
            identity.public_key_hex()
        );
    }
    Ok(())
}

async fn probe(config: HarnessConfig, bootstrap: PathBuf) -> Result<()> {
    let factory = WsRepositoryFactory {
        connection_timeout: Some(config.connection_timeout()),
        request_timeout: Some(config.request_timeout()),
    };
    let harness = IntegrationHarness::start(
        config,
        Arc::new(ProcessBootstrap::new(bootstrap)),
        Arc::new(factory),
    )
    .await
    .context("failed to start integration session")?;
    info!(api_url = %harness.api_url(), "session started");
    println!("{}", serde_json::to_string_pretty(harness.context().as_ref())?);
    harness.close().await?;
    Ok(())
}
