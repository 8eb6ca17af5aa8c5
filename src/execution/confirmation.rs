//! Confirmation polling for submitted signatures.
//!
//! Polls `signature_status` on a fixed interval until the cluster reports the
//! signature as confirmed, reports an on-chain failure, or the deadline passes.
//! Transient RPC errors while polling are logged and the loop carries on.

use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::ChainError;
use crate::execution::chain::{ChainClient, SignatureState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// Included in a block but failed during execution
    Failed(String),
    TimedOut,
}

pub struct ConfirmationPoller {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ConfirmationPoller {
    pub fn new(chain: Arc<dyn ChainClient>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            chain,
            poll_interval,
            timeout,
        }
    }

    pub async fn wait(&self, signature: &Signature) -> ConfirmationOutcome {
        // An unrepresentable deadline means "poll until an outcome arrives"
        let deadline = Instant::now().checked_add(self.timeout);
        let mut polls = 0u32;

        loop {
            polls += 1;
            match self.chain.signature_status(signature).await {
                Ok(Some(state)) if state.is_confirmed() => {
                    info!("Transaction {} confirmed after {} poll(s)", signature, polls);
                    return ConfirmationOutcome::Confirmed;
                }
                Ok(Some(SignatureState::Failed(reason))) => {
                    warn!("Transaction {} failed on-chain: {}", signature, reason);
                    return ConfirmationOutcome::Failed(reason);
                }
                Ok(state) => debug!("Transaction {} status: {:?}", signature, state),
                Err(ChainError::Transient(e)) => debug!("Status poll failed, will retry: {}", e),
                Err(ChainError::Rejected(e)) => warn!("Status poll rejected: {}", e),
            }

            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    warn!("Monitoring for transaction {} expired after {} poll(s)", signature, polls);
                    return ConfirmationOutcome::TimedOut;
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };
            sleep(wait).await;
        }
    }
}
