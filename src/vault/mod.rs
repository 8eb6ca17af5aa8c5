//! Vault module - custody of wallet keys
//!
//! Keys are generated from the OS CSPRNG, encrypted at rest with
//! XChaCha20-Poly1305 under a master key, and only decrypted inside the
//! scope of `KeyVault::with_decrypted_key`.

pub mod crypto;
pub mod key_vault;
pub mod storage;
pub mod types;

pub use crypto::{MasterKey, WipeOnDrop};
pub use key_vault::KeyVault;
pub use storage::{InMemoryKeyStore, KeyStore, SqliteKeyStore};
pub use types::{EncryptedKeyRecord, WalletCreated, KEYPAIR_LEN};
