//! Quote and unsigned-transaction types.
//!
//! Aggregator responses are untrusted input: a `Quote` can only be built
//! through [`Quote::from_aggregator_json`], which validates every field the
//! pipeline relies on and keeps the raw JSON for pass-through.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::QuoteError;

/// Parameters of a quote lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input amount in the input token's smallest unit
    pub amount: u64,
    pub slippage_bps: u16,
}

impl QuoteRequest {
    /// Basic sanity checks plus the slippage ceiling.
    pub fn validate(&self, max_slippage_bps: u16) -> Result<(), QuoteError> {
        if self.amount == 0 {
            return Err(QuoteError::InvalidRequest("amount must be positive".to_string()));
        }
        if self.input_mint == self.output_mint {
            return Err(QuoteError::InvalidRequest(
                "input and output mints must differ".to_string(),
            ));
        }
        if self.slippage_bps > max_slippage_bps {
            return Err(QuoteError::SlippageExceeded {
                requested_bps: self.slippage_bps,
                ceiling_bps: max_slippage_bps,
            });
        }
        Ok(())
    }
}

/// A validated, immutable swap quote.
#[derive(Debug, Clone)]
pub struct Quote {
    input_mint: Pubkey,
    output_mint: Pubkey,
    in_amount: u64,
    out_amount: u64,
    other_amount_threshold: u64,
    slippage_bps: u16,
    price_impact_pct: f64,
    route_hops: usize,
    context_slot: Option<u64>,
    raw: Value,
    fetched_at: Instant,
}

impl Quote {
    /// Validate an aggregator quote response against the request that produced it.
    pub fn from_aggregator_json(
        raw: Value,
        request: &QuoteRequest,
        max_slippage_bps: u16,
    ) -> Result<Self, QuoteError> {
        let input_mint = pubkey_field(&raw, "inputMint")?;
        let output_mint = pubkey_field(&raw, "outputMint")?;
        if input_mint != request.input_mint || output_mint != request.output_mint {
            return Err(QuoteError::Unavailable(
                "quote mints do not match the request".to_string(),
            ));
        }

        let in_amount = amount_field(&raw, "inAmount")?;
        if in_amount != request.amount {
            return Err(QuoteError::Unavailable(format!(
                "quote input amount {} does not match requested {}",
                in_amount, request.amount
            )));
        }

        let out_amount = amount_field(&raw, "outAmount")?;
        if out_amount == 0 {
            return Err(QuoteError::Unavailable("no liquidity for this route".to_string()));
        }
        let other_amount_threshold = amount_field(&raw, "otherAmountThreshold")?;
        if other_amount_threshold > out_amount {
            return Err(QuoteError::Unavailable(
                "minimum output exceeds quoted output".to_string(),
            ));
        }

        let slippage_bps = raw
            .get("slippageBps")
            .and_then(Value::as_u64)
            .and_then(|bps| u16::try_from(bps).ok())
            .ok_or_else(|| malformed("slippageBps"))?;
        if slippage_bps > max_slippage_bps {
            return Err(QuoteError::SlippageExceeded {
                requested_bps: slippage_bps,
                ceiling_bps: max_slippage_bps,
            });
        }

        let route_hops = raw
            .get("routePlan")
            .and_then(Value::as_array)
            .map(Vec::len)
            .ok_or_else(|| malformed("routePlan"))?;
        if route_hops == 0 {
            return Err(QuoteError::Unavailable("no route found".to_string()));
        }

        let price_impact_pct = match raw.get("priceImpactPct") {
            None | Some(Value::Null) => 0.0,
            Some(Value::String(s)) => s.parse::<f64>().map_err(|_| malformed("priceImpactPct"))?,
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| malformed("priceImpactPct"))?,
            Some(_) => return Err(malformed("priceImpactPct")),
        };
        if !price_impact_pct.is_finite() || price_impact_pct < 0.0 {
            return Err(malformed("priceImpactPct"));
        }

        let context_slot = raw.get("contextSlot").and_then(Value::as_u64);

        Ok(Self {
            input_mint,
            output_mint,
            in_amount,
            out_amount,
            other_amount_threshold,
            slippage_bps,
            price_impact_pct,
            route_hops,
            context_slot,
            raw,
            fetched_at: Instant::now(),
        })
    }

    pub fn input_mint(&self) -> &Pubkey {
        &self.input_mint
    }

    pub fn output_mint(&self) -> &Pubkey {
        &self.output_mint
    }

    pub fn in_amount(&self) -> u64 {
        self.in_amount
    }

    pub fn out_amount(&self) -> u64 {
        self.out_amount
    }

    /// Minimum output after slippage
    pub fn other_amount_threshold(&self) -> u64 {
        self.other_amount_threshold
    }

    pub fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    pub fn price_impact_pct(&self) -> f64 {
        self.price_impact_pct
    }

    pub fn route_hops(&self) -> usize {
        self.route_hops
    }

    pub fn context_slot(&self) -> Option<u64> {
        self.context_slot
    }

    /// The aggregator's original response, passed back unmodified on `/swap`.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

fn malformed(field: &str) -> QuoteError {
    QuoteError::Unavailable(format!("malformed aggregator response: bad `{}`", field))
}

fn pubkey_field(raw: &Value, field: &str) -> Result<Pubkey, QuoteError> {
    raw.get(field)
        .and_then(Value::as_str)
        .and_then(|s| Pubkey::from_str(s).ok())
        .ok_or_else(|| malformed(field))
}

// Amounts arrive as decimal strings to survive JSON number precision.
fn amount_field(raw: &Value, field: &str) -> Result<u64, QuoteError> {
    match raw.get(field) {
        Some(Value::String(s)) => s.parse::<u64>().map_err(|_| malformed(field)),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| malformed(field)),
        _ => Err(malformed(field)),
    }
}

/// A freshly built, not yet signed swap transaction.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    transaction: VersionedTransaction,
    last_valid_block_height: Option<u64>,
    built_at: Instant,
}

impl UnsignedTransaction {
    pub fn new(transaction: VersionedTransaction, last_valid_block_height: Option<u64>) -> Self {
        Self {
            transaction,
            last_valid_block_height,
            built_at: Instant::now(),
        }
    }

    /// Decode the aggregator's base64, bincode-serialized transaction.
    pub fn from_base64(
        encoded: &str,
        last_valid_block_height: Option<u64>,
    ) -> Result<Self, QuoteError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| QuoteError::TransactionBuild {
                reason: format!("swap transaction is not valid base64: {}", e),
                transient: false,
            })?;
        let transaction: VersionedTransaction =
            bincode::deserialize(&bytes).map_err(|e| QuoteError::TransactionBuild {
                reason: format!("swap transaction could not be decoded: {}", e),
                transient: false,
            })?;
        if transaction.message.header().num_required_signatures == 0 {
            return Err(QuoteError::TransactionBuild {
                reason: "swap transaction requires no signatures".to_string(),
                transient: false,
            });
        }
        Ok(Self::new(transaction, last_valid_block_height))
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn recent_blockhash(&self) -> &Hash {
        self.transaction.message.recent_blockhash()
    }

    /// First static account key, which pays fees and must sign.
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.static_account_keys().first()
    }

    pub fn last_valid_block_height(&self) -> Option<u64> {
        self.last_valid_block_height
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }
}
