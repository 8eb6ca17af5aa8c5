//! Core request/result types shared by the service and the executor.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{TradeError, TradeFailure};

/// Wrapped SOL mint, used as the input of buys and the output of sells.
pub const NATIVE_SOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");

/// A wallet as the executor sees it: the id to fetch the key with and the
/// public key the transaction must be paid for by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    pub wallet_id: String,
    pub public_key: Pubkey,
}

/// A swap requested by a user.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub wallet_id: String,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Base units of `input_mint`
    pub amount: u64,
    /// Falls back to the configured default
    pub slippage_bps: Option<u16>,
    /// Wait for cluster confirmation before returning
    pub confirm: bool,
    /// Per-request opt-out of the anti-front-running delay
    pub anti_front_run: bool,
}

impl TradeRequest {
    pub fn new(wallet_id: impl Into<String>, input_mint: Pubkey, output_mint: Pubkey, amount: u64) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            input_mint,
            output_mint,
            amount,
            slippage_bps: None,
            confirm: false,
            anti_front_run: true,
        }
    }

    /// Spend `lamports` of SOL on `mint`.
    pub fn buy(wallet_id: impl Into<String>, mint: Pubkey, lamports: u64) -> Self {
        Self::new(wallet_id, NATIVE_SOL_MINT, mint, lamports)
    }

    /// Sell `amount` base units of `mint` for SOL.
    pub fn sell(wallet_id: impl Into<String>, mint: Pubkey, amount: u64) -> Self {
        Self::new(wallet_id, mint, NATIVE_SOL_MINT, amount)
    }

    pub fn with_slippage_bps(mut self, bps: u16) -> Self {
        self.slippage_bps = Some(bps);
        self
    }

    pub fn with_confirmation(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_anti_front_run(mut self, enabled: bool) -> Self {
        self.anti_front_run = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeStatus {
    /// Accepted by an RPC node; not yet known to be confirmed
    Submitted,
    Confirmed,
    Failed(TradeFailure),
}

/// Outcome of a trade. Never carries key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    /// Base58 signature, present once a signed transaction has been sent
    pub transaction_id: Option<String>,
    pub status: TradeStatus,
}

impl TradeResult {
    pub fn submitted(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            status: TradeStatus::Submitted,
        }
    }

    pub fn confirmed(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            status: TradeStatus::Confirmed,
        }
    }

    pub fn failed(transaction_id: Option<String>, failure: TradeFailure) -> Self {
        Self {
            transaction_id,
            status: TradeStatus::Failed(failure),
        }
    }

    pub fn from_error(transaction_id: Option<String>, err: &TradeError) -> Self {
        Self::failed(transaction_id, TradeFailure::from(err))
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, TradeStatus::Failed(_))
    }

    pub fn failure(&self) -> Option<&TradeFailure> {
        match &self.status {
            TradeStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
