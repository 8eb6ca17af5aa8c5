//! TradingService - the surface a chat front end or the CLI talks to.
//!
//! Owns the collaborators and turns user requests into vault and executor
//! calls. Nothing here returns key material, and failures come back as
//! structured `TradeFailure`s rather than raw errors.

use anyhow::Result;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{Stage, TradeError, TradeErrorKind, TradeFailure};
use crate::execution::{CancelSignal, ChainClient, ExecutionOptions, RpcChainClient, TradeExecutor};
use crate::quote::{JupiterQuoteSource, QuoteRequest, QuoteSource};
use crate::types::{TradeRequest, TradeResult, WalletHandle};
use crate::vault::{KeyStore, KeyVault, MasterKey, SqliteKeyStore, WalletCreated};

const MAX_WALLET_ID_LEN: usize = 128;

pub struct TradingService {
    config: Config,
    vault: Arc<KeyVault>,
    quotes: Arc<dyn QuoteSource>,
    executor: TradeExecutor,
}

impl TradingService {
    pub fn new(
        config: Config,
        vault: Arc<KeyVault>,
        quotes: Arc<dyn QuoteSource>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        let executor = TradeExecutor::new(&config, vault.clone(), quotes.clone(), chain);
        Self {
            config,
            vault,
            quotes,
            executor,
        }
    }

    /// Production wiring: SQLite key store, Jupiter and a JSON-RPC node.
    pub async fn connect(config: Config, master_key: MasterKey) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn KeyStore> = Arc::new(
            SqliteKeyStore::new(&config.storage.database_url, config.storage.max_connections).await?,
        );
        let vault = Arc::new(KeyVault::new(store, master_key));
        let quotes = Arc::new(JupiterQuoteSource::new(reqwest::Client::new(), config.aggregator.clone()));
        let chain = Arc::new(RpcChainClient::from_config(&config.chain));
        Ok(Self::new(config, vault, quotes, chain))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a wallet. The result carries the public key and the encrypted
    /// record, never the plaintext key.
    #[instrument(skip(self))]
    pub async fn create_wallet(&self, wallet_id: &str) -> Result<WalletCreated, TradeFailure> {
        validate_wallet_id(wallet_id)?;
        self.vault
            .create_wallet(wallet_id)
            .await
            .map_err(TradeFailure::from)
    }

    pub async fn remove_wallet(&self, wallet_id: &str) -> Result<(), TradeFailure> {
        self.vault
            .remove_wallet(wallet_id)
            .await
            .map_err(TradeFailure::from)
    }

    pub async fn public_key(&self, wallet_id: &str) -> Result<Pubkey, TradeFailure> {
        self.vault
            .public_key(wallet_id)
            .await
            .map_err(TradeFailure::from)
    }

    pub async fn trade(&self, request: TradeRequest) -> TradeResult {
        self.trade_with_cancel(request, CancelSignal::never()).await
    }

    /// Quote and execute a swap. `cancel` is honoured until broadcast.
    #[instrument(skip(self, request, cancel), fields(wallet = %request.wallet_id, amount = request.amount))]
    pub async fn trade_with_cancel(&self, request: TradeRequest, cancel: CancelSignal) -> TradeResult {
        if let Err(failure) = validate_wallet_id(&request.wallet_id) {
            return TradeResult::failed(None, failure);
        }

        let quote_request = QuoteRequest {
            input_mint: request.input_mint,
            output_mint: request.output_mint,
            amount: request.amount,
            slippage_bps: request
                .slippage_bps
                .unwrap_or(self.config.aggregator.default_slippage_bps),
        };
        if let Err(e) = quote_request.validate(self.config.aggregator.max_slippage_bps) {
            return TradeResult::from_error(None, &TradeError::Quote(e));
        }

        let public_key = match self.vault.public_key(&request.wallet_id).await {
            Ok(key) => key,
            Err(e) => return TradeResult::from_error(None, &TradeError::Vault(e)),
        };
        let wallet = WalletHandle {
            wallet_id: request.wallet_id.clone(),
            public_key,
        };

        let quote = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TradeResult::from_error(None, &TradeError::Cancelled),
            fetched = tokio::time::timeout(self.config.aggregator.quote_timeout(), self.quotes.get_quote(&quote_request)) => {
                match fetched {
                    Ok(Ok(quote)) => quote,
                    Ok(Err(e)) => {
                        warn!("Quote failed: {}", e);
                        return TradeResult::from_error(None, &TradeError::Quote(e));
                    }
                    Err(_) => return TradeResult::from_error(None, &TradeError::Timeout(Stage::Quote)),
                }
            }
        };
        info!(
            "Quote received: {} -> {} ({} hops, impact {:.4}%)",
            quote.in_amount(),
            quote.out_amount(),
            quote.route_hops(),
            quote.price_impact_pct()
        );

        let options = ExecutionOptions {
            anti_front_run: request.anti_front_run,
            confirm: request.confirm,
            cancel,
        };
        self.executor.execute(&quote, &wallet, &options).await
    }
}

fn validate_wallet_id(wallet_id: &str) -> Result<(), TradeFailure> {
    if wallet_id.trim().is_empty() {
        return Err(TradeFailure::new(TradeErrorKind::InvalidRequest, "wallet id must not be empty"));
    }
    if wallet_id.len() > MAX_WALLET_ID_LEN {
        return Err(TradeFailure::new(
            TradeErrorKind::InvalidRequest,
            format!("wallet id longer than {} bytes", MAX_WALLET_ID_LEN),
        ));
    }
    Ok(())
}
