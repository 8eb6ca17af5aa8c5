//! Quote module - pricing and transaction building through a swap aggregator

pub mod jupiter;
pub mod types;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::error::QuoteError;

pub use jupiter::JupiterQuoteSource;
pub use types::{Quote, QuoteRequest, UnsignedTransaction};

/// Source of swap quotes and of the unsigned transactions that execute them.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Price a swap. Fails with `Unavailable` on network errors, malformed
    /// responses or routes without liquidity.
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError>;

    /// Exchange a quote for a fresh unsigned transaction paid for by `user`.
    /// Fails with `Expired` when the quote is too old or the aggregator
    /// refuses it; callers must fetch a new quote rather than retry.
    async fn build_signable_transaction(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<UnsignedTransaction, QuoteError>;
}
