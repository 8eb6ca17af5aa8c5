//! Chain RPC collaborator.
//!
//! The executor only needs four calls from the cluster. `RpcChainClient`
//! implements them over the nonblocking Solana RPC client and folds its error
//! taxonomy into `ChainError::Transient` / `ChainError::Rejected`.

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_request::RpcError;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::ChainConfig;
use crate::error::ChainError;

// Server-side JSON-RPC codes that mean "ask again later".
const NODE_UNHEALTHY: i64 = -32005;
const SLOT_SKIPPED_OR_BEHIND: i64 = -32004;

/// Observed state of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    Processed,
    Confirmed,
    Finalized,
    /// Landed but the transaction failed on-chain
    Failed(String),
}

impl SignatureState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SignatureState::Confirmed | SignatureState::Finalized)
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_height(&self) -> Result<u64, ChainError>;

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ChainError>;

    /// Submit a signed transaction; returns its signature.
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError>;

    /// `None` while the cluster has not seen the signature.
    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureState>, ChainError>;
}

/// Map a Solana client error into the executor's two-way classification.
///
/// The raw client error can embed the RPC URL or preflight logs, so it is only
/// logged at debug level. The classified reason keeps the JSON-RPC code or
/// transaction error.
pub fn classify_client_error(err: &ClientError) -> ChainError {
    debug!("RPC client error: {}", err);
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
            ChainError::Transient("RPC endpoint unreachable".to_string())
        }
        ClientErrorKind::RpcError(RpcError::RpcRequestError(_)) => {
            ChainError::Transient("RPC request failed".to_string())
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. })
            if *code == NODE_UNHEALTHY || *code == SLOT_SKIPPED_OR_BEHIND =>
        {
            ChainError::Transient(format!("RPC error {}", code))
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => {
            ChainError::Rejected(format!("RPC error {}", code))
        }
        ClientErrorKind::TransactionError(e) => ChainError::Rejected(format!("transaction error {:?}", e)),
        _ => ChainError::Rejected("RPC call refused".to_string()),
    }
}

/// ChainClient backed by a Solana JSON-RPC endpoint.
pub struct RpcChainClient {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcChainClient {
    pub fn new(url: String, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url, timeout, commitment),
            commitment,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            config.rpc_url.clone(),
            config.rpc_timeout(),
            CommitmentConfig::confirmed(),
        )
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_height(&self) -> Result<u64, ChainError> {
        self.client
            .get_block_height()
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, ChainError> {
        self.client
            .is_blockhash_valid(blockhash, self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    #[instrument(skip(self, transaction), fields(signature = %transaction.signatures.first().copied().unwrap_or_default()))]
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, ChainError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            // Retries are driven by the executor, not the RPC node
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };

        match self.client.send_transaction_with_config(transaction, config).await {
            Ok(signature) => {
                debug!("Transaction accepted by RPC node");
                Ok(signature)
            }
            Err(e) => {
                let classified = classify_client_error(&e);
                warn!("Transaction submission failed: {}", classified);
                Err(classified)
            }
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureState>, ChainError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| classify_client_error(&e))?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(None),
        };

        if let Some(err) = status.err {
            return Ok(Some(SignatureState::Failed(err.to_string())));
        }

        let state = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => SignatureState::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => SignatureState::Confirmed,
            Some(TransactionConfirmationStatus::Processed) | None => SignatureState::Processed,
        };
        Ok(Some(state))
    }
}
