//! Shared fakes for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swapvault::{
    ChainClient, ChainError, Config, ConfigBuilder, EncryptedKeyRecord, InMemoryKeyStore, KeyStore,
    KeyVault, MasterKey, Quote, QuoteError, QuoteRequest, QuoteSource, SignatureState, TradeExecutor,
    TradingService, UnsignedTransaction,
};
use tokio::sync::Notify;

pub const LAST_VALID_BLOCK_HEIGHT: u64 = 1_000;

/// Fast, delay-free configuration for tests.
pub fn test_config() -> Config {
    let mut config = ConfigBuilder::new()
        .with_delay(None)
        .with_broadcast_retries(3, 2)
        .with_min_remaining_blocks(20)
        .with_confirmation(Duration::from_millis(500), Duration::from_millis(5))
        .build()
        .expect("valid test config");
    config.aggregator.build_timeout_ms = 1_000;
    config.aggregator.quote_timeout_ms = 1_000;
    config
}

/// Aggregator stand-in. Quotes echo the request, builds produce a simple
/// transfer paid for by the requesting user.
pub struct FakeQuoteSource {
    pub ttl: Duration,
    pub last_valid_block_height: Mutex<Option<u64>>,
    pub quote_delay: Mutex<Option<Duration>>,
    pub build_delay: Mutex<Option<Duration>>,
    pub fee_payer_override: Mutex<Option<Pubkey>>,
    pub quotes: AtomicUsize,
    pub builds: AtomicUsize,
}

impl FakeQuoteSource {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_valid_block_height: Mutex::new(Some(LAST_VALID_BLOCK_HEIGHT)),
            quote_delay: Mutex::new(None),
            build_delay: Mutex::new(None),
            fee_payer_override: Mutex::new(None),
            quotes: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
        }
    }
}

pub fn quote_json(request: &QuoteRequest) -> serde_json::Value {
    json!({
        "inputMint": request.input_mint.to_string(),
        "inAmount": request.amount.to_string(),
        "outputMint": request.output_mint.to_string(),
        "outAmount": (request.amount / 2).max(1).to_string(),
        "otherAmountThreshold": (request.amount / 2).max(1).to_string(),
        "slippageBps": request.slippage_bps,
        "priceImpactPct": "0.0012",
        "routePlan": [{"swapInfo": {"label": "Orca"}, "percent": 100}],
        "contextSlot": 250_000_000u64
    })
}

#[async_trait]
impl QuoteSource for FakeQuoteSource {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.quote_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Quote::from_aggregator_json(quote_json(request), request, 10_000)
    }

    async fn build_signable_transaction(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<UnsignedTransaction, QuoteError> {
        if quote.is_expired(self.ttl) {
            return Err(QuoteError::Expired("quote is too old".to_string()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);

        let delay = *self.build_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let payer = self.fee_payer_override.lock().unwrap().unwrap_or(*user);
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), quote.in_amount());
        let mut message = Message::new(&[ix], Some(&payer));
        message.recent_blockhash = Hash::new_unique();
        let transaction = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        };
        let last_valid = *self.last_valid_block_height.lock().unwrap();
        Ok(UnsignedTransaction::new(transaction, last_valid))
    }
}

/// Cluster stand-in with scripted send outcomes and signature statuses.
pub struct FakeChain {
    pub height: AtomicU64,
    pub blockhash_valid: AtomicBool,
    pub send_script: Mutex<VecDeque<Result<(), ChainError>>>,
    pub send_delay: Mutex<Option<Duration>>,
    pub statuses: Mutex<VecDeque<Option<SignatureState>>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            height: AtomicU64::new(LAST_VALID_BLOCK_HEIGHT - 150),
            blockhash_valid: AtomicBool::new(true),
            send_script: Mutex::new(VecDeque::new()),
            send_delay: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn script_sends(&self, outcomes: Vec<Result<(), ChainError>>) {
        *self.send_script.lock().unwrap() = outcomes.into();
    }

    pub fn script_statuses(&self, statuses: Vec<Option<SignatureState>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn block_height(&self) -> Result<u64, ChainError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn is_blockhash_valid(&self, _blockhash: &Hash) -> Result<bool, ChainError> {
        Ok(self.blockhash_valid.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError> {
        self.sent.lock().unwrap().push(transaction.clone());
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.send_script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        outcome.map(|()| transaction.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<Option<SignatureState>, ChainError> {
        Ok(self.statuses.lock().unwrap().pop_front().flatten())
    }
}

struct ReadGate {
    wallet_id: String,
    skip: usize,
    notify: Arc<Notify>,
}

/// In-memory key store that counts reads and can hold one read open.
#[derive(Default)]
pub struct CountingKeyStore {
    inner: InMemoryKeyStore,
    pub gets: AtomicUsize,
    gate: Mutex<Option<ReadGate>>,
    pub parked: Notify,
}

impl CountingKeyStore {
    /// Let `skip` reads of `wallet_id` through, then block the next one until
    /// the returned `Notify` fires. `parked` is signalled once it blocks.
    pub fn gate(&self, wallet_id: &str, skip: usize) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(ReadGate {
            wallet_id: wallet_id.to_string(),
            skip,
            notify: notify.clone(),
        });
        notify
    }

    pub fn reads(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for CountingKeyStore {
    async fn put(&self, record: &EncryptedKeyRecord) -> Result<bool> {
        self.inner.put(record).await
    }

    async fn get(&self, wallet_id: &str) -> Result<Option<EncryptedKeyRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            match slot.take() {
                Some(g) if g.wallet_id != wallet_id => {
                    *slot = Some(g);
                    None
                }
                Some(mut g) if g.skip > 0 => {
                    g.skip -= 1;
                    *slot = Some(g);
                    None
                }
                Some(g) => Some(g.notify),
                None => None,
            }
        };
        if let Some(notify) = gate {
            self.parked.notify_one();
            notify.notified().await;
        }
        self.inner.get(wallet_id).await
    }

    async fn delete(&self, wallet_id: &str) -> Result<bool> {
        self.inner.delete(wallet_id).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }
}

/// All collaborators wired together around fakes.
pub struct Harness {
    pub config: Config,
    pub store: Arc<CountingKeyStore>,
    pub vault: Arc<KeyVault>,
    pub quotes: Arc<FakeQuoteSource>,
    pub chain: Arc<FakeChain>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(CountingKeyStore::default());
        let vault = Arc::new(KeyVault::new(store.clone(), MasterKey::generate()));
        let quotes = Arc::new(FakeQuoteSource::new(config.aggregator.quote_ttl()));
        Self {
            config,
            store,
            vault,
            quotes,
            chain: Arc::new(FakeChain::new()),
        }
    }

    pub fn service(&self) -> TradingService {
        TradingService::new(
            self.config.clone(),
            self.vault.clone(),
            self.quotes.clone(),
            self.chain.clone(),
        )
    }

    pub fn executor(&self) -> TradeExecutor {
        TradeExecutor::new(&self.config, self.vault.clone(), self.quotes.clone(), self.chain.clone())
    }
}

pub fn mints() -> (Pubkey, Pubkey) {
    (Pubkey::new_unique(), Pubkey::new_unique())
}
