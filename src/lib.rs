//! swapvault - custodial Solana wallets and aggregator-routed token swaps
//!
//! Wallet keys are kept encrypted under a single master key and only ever
//! decrypted inside a scoped signing callback. Swaps are priced and built by
//! the Jupiter aggregator, signed locally, and broadcast with bounded retries.

pub mod config;
pub mod error;
pub mod execution;
pub mod holdings;
pub mod quote;
pub mod service;
pub mod types;
pub mod vault;

// Re-export main types for convenience
pub use config::{Config, ConfigBuilder};
pub use error::{ChainError, QuoteError, Stage, TradeError, TradeErrorKind, TradeFailure, VaultError};
pub use execution::{
    AntiFrontRunDelay, CancelHandle, CancelSignal, ChainClient, ExecutionOptions, RpcChainClient,
    SignatureState, TradeExecutor,
};
pub use holdings::{Action, Command, HoldingsLedger, SortBy, TokenHolding};
pub use quote::{JupiterQuoteSource, Quote, QuoteRequest, QuoteSource, UnsignedTransaction};
pub use service::TradingService;
pub use types::{TradeRequest, TradeResult, TradeStatus, WalletHandle, NATIVE_SOL_MINT};
pub use vault::{
    EncryptedKeyRecord, InMemoryKeyStore, KeyStore, KeyVault, MasterKey, SqliteKeyStore, WalletCreated,
};
