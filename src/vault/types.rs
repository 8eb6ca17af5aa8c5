//! Records owned by the key vault.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Length of a serialized ed25519 keypair (secret seed followed by public key).
pub const KEYPAIR_LEN: usize = 64;

/// Encrypted wallet key as persisted. Created once, never mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyRecord {
    /// Opaque wallet identifier (the chat user id in practice)
    pub wallet_id: String,
    /// Public key of the wallet, safe to share
    pub public_key: Pubkey,
    /// AEAD envelope around the 64-byte keypair encoding
    pub ciphertext: Vec<u8>,
    /// Creation time in unix milliseconds
    pub created_at: i64,
}

// Ciphertext is not secret, but there is no reason to spray it across logs either.
impl fmt::Debug for EncryptedKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKeyRecord")
            .field("wallet_id", &self.wallet_id)
            .field("public_key", &self.public_key)
            .field("ciphertext", &format_args!("<{} bytes>", self.ciphertext.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// What a caller gets back from wallet creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCreated {
    pub wallet_id: String,
    pub public_key: Pubkey,
    pub record: EncryptedKeyRecord,
}
