//! swapvault command-line interface
//!
//! Wallet creation, swaps and holdings listing against the configured
//! aggregator, RPC node and SQLite database. The master key is read from
//! `SWAPVAULT_MASTER_KEY` (base64, 32 bytes).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use swapvault::{Config, HoldingsLedger, MasterKey, SortBy, TradeRequest, TradeStatus, TradingService};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MASTER_KEY_VAR: &str = "SWAPVAULT_MASTER_KEY";

#[derive(Parser)]
#[command(name = "swapvault")]
#[command(about = "Custodial Solana wallets with Jupiter-routed swaps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file; SWAPVAULT_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh base64 master key
    GenerateMasterKey,

    /// Create a wallet and print its public key
    CreateWallet {
        wallet_id: String,
    },

    /// Swap `amount` base units of one mint into another
    Trade {
        wallet_id: String,
        input_mint: Pubkey,
        output_mint: Pubkey,
        amount: u64,

        /// Slippage tolerance in basis points
        #[arg(long)]
        slippage_bps: Option<u16>,

        /// Wait for cluster confirmation
        #[arg(long)]
        confirm: bool,

        /// Skip the anti-front-running delay
        #[arg(long)]
        no_delay: bool,
    },

    /// List a wallet's token holdings
    List {
        wallet_id: String,

        #[arg(default_value_t = 1)]
        page: u32,

        /// value or date
        #[arg(default_value = "value")]
        sort: SortBy,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::GenerateMasterKey => {
            let key = MasterKey::generate();
            println!("{}", key.to_base64().as_str());
        }
        Commands::CreateWallet { wallet_id } => {
            let service = connect(config).await?;
            match service.create_wallet(&wallet_id).await {
                Ok(created) => {
                    println!("Wallet created!\nPublic Key: {}", created.public_key);
                    println!("Your private key has been encrypted and stored securely.");
                }
                Err(failure) => bail!("{}", failure),
            }
        }
        Commands::Trade {
            wallet_id,
            input_mint,
            output_mint,
            amount,
            slippage_bps,
            confirm,
            no_delay,
        } => {
            let service = connect(config).await?;
            let mut request = TradeRequest::new(wallet_id, input_mint, output_mint, amount)
                .with_confirmation(confirm)
                .with_anti_front_run(!no_delay);
            if let Some(bps) = slippage_bps {
                request = request.with_slippage_bps(bps);
            }

            let result = service.trade(request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let TradeStatus::Failed(failure) = &result.status {
                bail!("trade failed: {}", failure);
            }
        }
        Commands::List { wallet_id, page, sort } => {
            let ledger =
                HoldingsLedger::connect(&config.storage.database_url, config.storage.max_connections).await?;
            let listing = ledger.list_page(&wallet_id, page, sort).await?;
            print!("{}", listing.render());
            let nav: Vec<String> = listing.action().navigation().iter().map(|a| a.encode()).collect();
            info!("Navigation: {}", nav.join(" "));
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env()?;
            config.validate()?;
            Ok(config)
        }
        None => Config::from_env(),
    }
}

async fn connect(config: Config) -> Result<TradingService> {
    let master_key = MasterKey::from_env(MASTER_KEY_VAR)
        .with_context(|| format!("{} must hold a base64 32-byte key", MASTER_KEY_VAR))?;
    info!("Connecting to {} and {}", config.aggregator.base_url, config.chain.rpc_url);
    TradingService::connect(config, master_key).await
}
