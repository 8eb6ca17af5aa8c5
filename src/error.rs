//! Error taxonomy for custody and trade execution.
//!
//! Component errors (`VaultError`, `QuoteError`, `ChainError`) converge into
//! `TradeError` inside the executor, and `TradeError` is flattened into a
//! [`TradeFailure`] before anything reaches the chat/UI layer. None of these
//! types carry key material. Only `TradeFailure` messages are meant for end
//! users; component errors may hold upstream detail that belongs in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the key vault and its storage.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed master key, tampered/corrupt ciphertext or a record whose
    /// decrypted key does not match its stored public key.
    #[error("cryptographic failure: {0}")]
    Crypto(String),

    #[error("no key stored for wallet {0}")]
    KeyNotFound(String),

    #[error("wallet {0} already exists")]
    AlreadyExists(String),

    #[error("key storage failure: {0}")]
    Storage(String),
}

/// Errors raised while talking to the swap aggregator.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote unavailable: {0}")]
    Unavailable(String),

    #[error("quote expired: {0}")]
    Expired(String),

    #[error("slippage {requested_bps} bps exceeds the configured ceiling of {ceiling_bps} bps")]
    SlippageExceeded { requested_bps: u16, ceiling_bps: u16 },

    #[error("failed to build swap transaction: {reason}")]
    TransactionBuild { reason: String, transient: bool },

    #[error("invalid quote request: {0}")]
    InvalidRequest(String),
}

/// Errors raised by the chain RPC collaborator, already classified.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Network-level failure; the same request may be retried.
    #[error("transient RPC failure: {0}")]
    Transient(String),

    /// The cluster refused the request; retrying the same bytes will not help.
    #[error("rejected by network: {0}")]
    Rejected(String),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
}

/// Pipeline stage a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quote,
    Build,
    Broadcast,
    Confirmation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Quote => "quote fetch",
            Stage::Build => "transaction build",
            Stage::Broadcast => "broadcast",
            Stage::Confirmation => "confirmation",
        };
        f.write_str(name)
    }
}

/// Everything that can stop a trade.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("transaction anchored to stale chain state: {0}")]
    StaleTransaction(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast failed after {attempts} attempt(s): {reason}")]
    Broadcast { attempts: usize, reason: String },

    #[error("transaction rejected by network: {0}")]
    RejectedByNetwork(String),

    #[error("{0} timed out")]
    Timeout(Stage),

    #[error("trade cancelled before broadcast")]
    Cancelled,
}

/// Error category surfaced to the chat/UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeErrorKind {
    Crypto,
    KeyNotFound,
    QuoteUnavailable,
    QuoteExpired,
    SlippageExceeded,
    StaleTransaction,
    TransactionBuild,
    Broadcast,
    RejectedByNetwork,
    Timeout,
    Cancelled,
    InvalidRequest,
    Storage,
}

impl TradeErrorKind {
    /// Whether the user can reasonably try again (usually with a fresh quote).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TradeErrorKind::QuoteUnavailable
                | TradeErrorKind::QuoteExpired
                | TradeErrorKind::StaleTransaction
                | TradeErrorKind::Broadcast
                | TradeErrorKind::Timeout
                | TradeErrorKind::Cancelled
        )
    }
}

/// Structured, human-safe failure carried by a failed `TradeResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFailure {
    pub kind: TradeErrorKind,
    pub message: String,
    /// Set when a retry with a fresh quote may succeed.
    pub recoverable: bool,
}

impl TradeFailure {
    pub fn new(kind: TradeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: kind.is_recoverable(),
        }
    }
}

impl fmt::Display for TradeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<&TradeError> for TradeFailure {
    fn from(err: &TradeError) -> Self {
        match err {
            TradeError::Vault(VaultError::Crypto(_)) => TradeFailure::new(
                TradeErrorKind::Crypto,
                "stored wallet key could not be decrypted",
            ),
            TradeError::Vault(VaultError::KeyNotFound(id)) => {
                TradeFailure::new(TradeErrorKind::KeyNotFound, format!("no wallet found for {id}"))
            }
            TradeError::Vault(e @ VaultError::AlreadyExists(_)) => {
                TradeFailure::new(TradeErrorKind::InvalidRequest, e.to_string())
            }
            TradeError::Vault(VaultError::Storage(_)) => {
                TradeFailure::new(TradeErrorKind::Storage, "wallet storage is unavailable")
            }
            // Aggregator and RPC reasons can carry endpoint URLs or simulation
            // logs, so those kinds get fixed messages.
            TradeError::Quote(e) => match e {
                QuoteError::Unavailable(_) => TradeFailure::new(
                    TradeErrorKind::QuoteUnavailable,
                    "no quote available right now",
                ),
                QuoteError::Expired(_) => TradeFailure::new(
                    TradeErrorKind::QuoteExpired,
                    "quote expired, request a new one",
                ),
                QuoteError::SlippageExceeded { .. } => {
                    TradeFailure::new(TradeErrorKind::SlippageExceeded, e.to_string())
                }
                QuoteError::TransactionBuild { transient, .. } => {
                    let mut failure = TradeFailure::new(
                        TradeErrorKind::TransactionBuild,
                        "swap transaction could not be built",
                    );
                    failure.recoverable = *transient;
                    failure
                }
                QuoteError::InvalidRequest(_) => {
                    TradeFailure::new(TradeErrorKind::InvalidRequest, e.to_string())
                }
            },
            TradeError::StaleTransaction(_) => {
                TradeFailure::new(TradeErrorKind::StaleTransaction, err.to_string())
            }
            TradeError::Signing(_) => {
                TradeFailure::new(TradeErrorKind::TransactionBuild, err.to_string())
            }
            TradeError::Broadcast { attempts, .. } => TradeFailure::new(
                TradeErrorKind::Broadcast,
                format!("broadcast failed after {attempts} attempt(s)"),
            ),
            TradeError::RejectedByNetwork(_) => TradeFailure::new(
                TradeErrorKind::RejectedByNetwork,
                "transaction rejected by network",
            ),
            TradeError::Timeout(_) => TradeFailure::new(TradeErrorKind::Timeout, err.to_string()),
            TradeError::Cancelled => TradeFailure::new(TradeErrorKind::Cancelled, err.to_string()),
        }
    }
}

impl From<VaultError> for TradeFailure {
    fn from(err: VaultError) -> Self {
        TradeFailure::from(&TradeError::Vault(err))
    }
}

impl From<QuoteError> for TradeFailure {
    fn from(err: QuoteError) -> Self {
        TradeFailure::from(&TradeError::Quote(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_failure_message_is_generic() {
        let err = TradeError::Vault(VaultError::Crypto("aead tag mismatch at byte 17".to_string()));
        let failure = TradeFailure::from(&err);

        assert_eq!(failure.kind, TradeErrorKind::Crypto);
        assert!(!failure.recoverable);
        assert!(!failure.message.contains("aead"));
    }

    #[test]
    fn test_transient_build_failure_is_recoverable() {
        let err = TradeError::Quote(QuoteError::TransactionBuild {
            reason: "aggregator returned 503".to_string(),
            transient: true,
        });
        let failure = TradeFailure::from(&err);

        assert_eq!(failure.kind, TradeErrorKind::TransactionBuild);
        assert!(failure.recoverable);
    }

    #[test]
    fn test_kind_recoverability() {
        assert!(TradeErrorKind::QuoteExpired.is_recoverable());
        assert!(TradeErrorKind::StaleTransaction.is_recoverable());
        assert!(TradeErrorKind::Broadcast.is_recoverable());
        assert!(!TradeErrorKind::RejectedByNetwork.is_recoverable());
        assert!(!TradeErrorKind::KeyNotFound.is_recoverable());
    }

    #[test]
    fn test_network_payloads_stay_out_of_messages() {
        let rejected = TradeFailure::from(&TradeError::RejectedByNetwork(
            "Transaction simulation failed: Program log: custom program error: 0x1771".to_string(),
        ));
        assert_eq!(rejected.kind, TradeErrorKind::RejectedByNetwork);
        assert!(!rejected.message.contains("Program log"));

        let broadcast = TradeFailure::from(&TradeError::Broadcast {
            attempts: 4,
            reason: "error sending request for url (https://rpc.example.com/?api-key=abc)".to_string(),
        });
        assert_eq!(broadcast.message, "broadcast failed after 4 attempt(s)");

        let expired = TradeFailure::from(&TradeError::Quote(QuoteError::Expired(
            "<html>upstream body</html>".to_string(),
        )));
        assert!(!expired.message.contains("html"));
    }

    #[test]
    fn test_timeout_names_stage() {
        let failure = TradeFailure::from(&TradeError::Timeout(Stage::Broadcast));
        assert_eq!(failure.kind, TradeErrorKind::Timeout);
        assert_eq!(failure.message, "broadcast timed out");
    }
}
