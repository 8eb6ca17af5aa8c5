//! TradeExecutor - drives one quoted swap through to submission.
//!
//! Stages, in order:
//!
//! 1. slippage re-check against the configured ceiling
//! 2. anti-front-running delay (optional, cancellable)
//! 3. build the unsigned transaction from the quote (timed, cancellable)
//! 4. freshness check of the transaction's blockhash against the chain
//! 5. fee payer check, then signing inside the vault's decrypted-key scope
//! 6. last cancellation point
//! 7. broadcast with bounded retries on transient errors (timed)
//! 8. optional confirmation polling
//!
//! Every stage failure ends the trade and is turned into a failed
//! `TradeResult`. Retries only ever resend the same signed bytes, so a
//! duplicate submission cannot execute twice.

use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, instrument, warn};

use crate::config::{AggregatorConfig, ChainConfig, Config};
use crate::error::{ChainError, QuoteError, Stage, TradeError};
use crate::execution::cancel::CancelSignal;
use crate::execution::chain::ChainClient;
use crate::execution::confirmation::{ConfirmationOutcome, ConfirmationPoller};
use crate::execution::delay::AntiFrontRunDelay;
use crate::quote::{Quote, QuoteSource, UnsignedTransaction};
use crate::types::{TradeResult, WalletHandle};
use crate::vault::KeyVault;

const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Per-trade knobs.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Ignored when the delay is disabled in configuration
    pub anti_front_run: bool,
    pub confirm: bool,
    pub cancel: CancelSignal,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            anti_front_run: true,
            confirm: false,
            cancel: CancelSignal::never(),
        }
    }
}

pub struct TradeExecutor {
    vault: Arc<KeyVault>,
    quotes: Arc<dyn QuoteSource>,
    chain: Arc<dyn ChainClient>,
    delay: AntiFrontRunDelay,
    aggregator: AggregatorConfig,
    chain_config: ChainConfig,
}

impl TradeExecutor {
    pub fn new(
        config: &Config,
        vault: Arc<KeyVault>,
        quotes: Arc<dyn QuoteSource>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            vault,
            quotes,
            chain,
            delay: AntiFrontRunDelay::from_config(&config.delay),
            aggregator: config.aggregator.clone(),
            chain_config: config.chain.clone(),
        }
    }

    /// Execute `quote` for `wallet`. Never fails: errors come back as a
    /// failed `TradeResult`.
    #[instrument(skip(self, quote, wallet, options), fields(wallet = %wallet.wallet_id, in_amount = quote.in_amount()))]
    pub async fn execute(&self, quote: &Quote, wallet: &WalletHandle, options: &ExecutionOptions) -> TradeResult {
        let signed = match self.prepare(quote, wallet, options).await {
            Ok(signed) => signed,
            Err(err) => {
                warn!("Trade aborted before broadcast: {}", err);
                return TradeResult::from_error(None, &err);
            }
        };

        if options.cancel.is_cancelled() {
            info!("Trade cancelled after signing; signed transaction discarded");
            return TradeResult::from_error(None, &TradeError::Cancelled);
        }

        let signature = match self.broadcast(&signed).await {
            Ok(signature) => signature,
            Err(err) => {
                warn!("Broadcast failed: {}", err);
                // The bytes may still land; hand the signature back so it can be looked up
                let id = signed.signatures.first().map(|s| s.to_string());
                return TradeResult::from_error(id, &err);
            }
        };
        info!("Transaction submitted: {}", signature);

        if !options.confirm {
            return TradeResult::submitted(signature.to_string());
        }

        match self.confirm(&signature).await {
            Ok(()) => TradeResult::confirmed(signature.to_string()),
            Err(err) => TradeResult::from_error(Some(signature.to_string()), &err),
        }
    }

    /// Stages up to and including signing.
    async fn prepare(
        &self,
        quote: &Quote,
        wallet: &WalletHandle,
        options: &ExecutionOptions,
    ) -> Result<VersionedTransaction, TradeError> {
        let ceiling = self.aggregator.max_slippage_bps;
        if quote.slippage_bps() > ceiling {
            return Err(QuoteError::SlippageExceeded {
                requested_bps: quote.slippage_bps(),
                ceiling_bps: ceiling,
            }
            .into());
        }
        debug!("Quoted: {} -> {} (min {})", quote.in_amount(), quote.out_amount(), quote.other_amount_threshold());

        if options.anti_front_run && self.delay.is_enabled() {
            let slept =
                cancellable(&options.cancel, async { Ok::<_, TradeError>(self.delay.apply().await) }).await?;
            debug!("Delay applied: {} ms", slept.as_millis());
        }

        let unsigned = cancellable(&options.cancel, async {
            tokio::time::timeout(
                self.aggregator.build_timeout(),
                self.quotes.build_signable_transaction(quote, &wallet.public_key),
            )
            .await
            .map_err(|_| TradeError::Timeout(Stage::Build))?
            .map_err(TradeError::from)
        })
        .await?;
        debug!("Transaction built, blockhash {}", unsigned.recent_blockhash());

        cancellable(&options.cancel, self.check_freshness(&unsigned)).await?;

        match unsigned.fee_payer() {
            Some(payer) if *payer == wallet.public_key => {}
            Some(payer) => {
                return Err(TradeError::Signing(format!(
                    "transaction fee payer {} is not the wallet {}",
                    payer, wallet.public_key
                )))
            }
            None => return Err(TradeError::Signing("transaction has no fee payer".to_string())),
        }

        let signed = self
            .vault
            .with_decrypted_key(&wallet.wallet_id, |keypair| {
                sign_transaction(unsigned.transaction(), keypair, wallet)
            })
            .await??;
        debug!("Transaction signed");
        Ok(signed)
    }

    /// Refuse transactions whose blockhash is expired or about to expire.
    async fn check_freshness(&self, unsigned: &UnsignedTransaction) -> Result<(), TradeError> {
        let unverifiable = |e: ChainError| {
            TradeError::StaleTransaction(format!("could not verify blockhash freshness: {}", e))
        };
        let rpc_timeout = self.chain_config.rpc_timeout();

        match unsigned.last_valid_block_height() {
            Some(last_valid) => {
                let height = tokio::time::timeout(rpc_timeout, self.chain.block_height())
                    .await
                    .map_err(|_| TradeError::Timeout(Stage::Build))?
                    .map_err(unverifiable)?;
                let remaining = last_valid.saturating_sub(height);
                if remaining < self.chain_config.min_remaining_blocks {
                    return Err(TradeError::StaleTransaction(format!(
                        "blockhash valid for {} more block(s), need at least {}",
                        remaining, self.chain_config.min_remaining_blocks
                    )));
                }
                debug!("Blockhash valid for {} more blocks", remaining);
            }
            None => {
                let valid = tokio::time::timeout(
                    rpc_timeout,
                    self.chain.is_blockhash_valid(unsigned.recent_blockhash()),
                )
                .await
                .map_err(|_| TradeError::Timeout(Stage::Build))?
                .map_err(unverifiable)?;
                if !valid {
                    return Err(TradeError::StaleTransaction(
                        "blockhash is no longer valid".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn broadcast(&self, signed: &VersionedTransaction) -> Result<Signature, TradeError> {
        let factor = (self.chain_config.broadcast_backoff_base_ms / 2).max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(MAX_BACKOFF)
            .map(jitter)
            .take(self.chain_config.broadcast_retries);

        let attempts = AtomicUsize::new(0);
        let send = RetryIf::spawn(
            strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Broadcast attempt {}", attempt);
                self.chain.send_transaction(signed)
            },
            |e: &ChainError| {
                if e.is_transient() {
                    warn!("Transient broadcast error: {}", e);
                }
                e.is_transient()
            },
        );

        let outcome = tokio::time::timeout(self.chain_config.broadcast_timeout(), send)
            .await
            .map_err(|_| TradeError::Timeout(Stage::Broadcast))?;

        match outcome {
            Ok(signature) => Ok(signature),
            Err(ChainError::Rejected(reason)) => Err(TradeError::RejectedByNetwork(reason)),
            Err(ChainError::Transient(reason)) => Err(TradeError::Broadcast {
                attempts: attempts.load(Ordering::SeqCst),
                reason,
            }),
        }
    }

    async fn confirm(&self, signature: &Signature) -> Result<(), TradeError> {
        let poller = ConfirmationPoller::new(
            self.chain.clone(),
            self.chain_config.confirmation_poll(),
            self.chain_config.confirmation_timeout(),
        );
        match poller.wait(signature).await {
            ConfirmationOutcome::Confirmed => Ok(()),
            ConfirmationOutcome::Failed(reason) => Err(TradeError::RejectedByNetwork(reason)),
            ConfirmationOutcome::TimedOut => Err(TradeError::Timeout(Stage::Confirmation)),
        }
    }
}

/// Race a pre-broadcast stage against cancellation.
async fn cancellable<T, F>(cancel: &CancelSignal, stage: F) -> Result<T, TradeError>
where
    F: Future<Output = Result<T, TradeError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TradeError::Cancelled),
        result = stage => result,
    }
}

fn sign_transaction(
    unsigned: &VersionedTransaction,
    keypair: &Keypair,
    wallet: &WalletHandle,
) -> Result<VersionedTransaction, TradeError> {
    if keypair.pubkey() != wallet.public_key {
        return Err(TradeError::Signing(
            "stored key does not belong to the wallet".to_string(),
        ));
    }
    VersionedTransaction::try_new(unsigned.message.clone(), &[keypair])
        .map_err(|e| TradeError::Signing(e.to_string()))
}
