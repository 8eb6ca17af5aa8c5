//! KeyVault: wallet creation and scoped access to decrypted keypairs.
//!
//! Plaintext key material only ever lives in a fixed-size scratch buffer owned
//! by a single `with_decrypted_key` call. The buffer is wrapped in
//! [`WipeOnDrop`] before decryption starts, so it is zeroed however the scope
//! ends: normal return, an error value returned by the closure, or a panic
//! unwinding through it. The `Keypair` built from it is dropped first and
//! zeroes its own copy of the secret.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::vault::crypto::{self, MasterKey, WipeOnDrop};
use crate::vault::storage::KeyStore;
use crate::vault::types::{EncryptedKeyRecord, WalletCreated, KEYPAIR_LEN};

/// Custodies wallet keys encrypted under a single master key.
pub struct KeyVault {
    store: Arc<dyn KeyStore>,
    master_key: MasterKey,
}

impl KeyVault {
    pub fn new(store: Arc<dyn KeyStore>, master_key: MasterKey) -> Self {
        Self { store, master_key }
    }

    /// Fresh keypair from the OS CSPRNG.
    pub fn generate_keypair() -> Keypair {
        Keypair::new()
    }

    /// Encrypt secret key material under the vault's master key.
    pub fn encrypt(&self, secret: &[u8]) -> Result<Vec<u8>, VaultError> {
        crypto::encrypt(secret, &self.master_key)
    }

    /// Decrypt an envelope produced by [`KeyVault::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        crypto::decrypt(ciphertext, &self.master_key)
    }

    /// Generate a keypair, encrypt it and persist the record.
    #[instrument(skip(self))]
    pub async fn create_wallet(&self, wallet_id: &str) -> Result<WalletCreated, VaultError> {
        let keypair = Self::generate_keypair();
        let public_key = keypair.pubkey();
        let secret = Zeroizing::new(keypair.to_bytes());
        drop(keypair);

        let record = EncryptedKeyRecord {
            wallet_id: wallet_id.to_string(),
            public_key,
            ciphertext: self.encrypt(secret.as_slice())?,
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let inserted = self
            .store
            .put(&record)
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        if !inserted {
            warn!("Refusing to overwrite existing wallet {}", wallet_id);
            return Err(VaultError::AlreadyExists(wallet_id.to_string()));
        }

        info!("Created wallet {} with public key {}", wallet_id, public_key);
        Ok(WalletCreated {
            wallet_id: wallet_id.to_string(),
            public_key,
            record,
        })
    }

    /// Delete a wallet's encrypted key. Irreversible.
    #[instrument(skip(self))]
    pub async fn remove_wallet(&self, wallet_id: &str) -> Result<(), VaultError> {
        let removed = self
            .store
            .delete(wallet_id)
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        if !removed {
            return Err(VaultError::KeyNotFound(wallet_id.to_string()));
        }
        info!("Removed wallet {}", wallet_id);
        Ok(())
    }

    /// Public key of a stored wallet; no decryption involved.
    pub async fn public_key(&self, wallet_id: &str) -> Result<Pubkey, VaultError> {
        Ok(self.load(wallet_id).await?.public_key)
    }

    /// Run `f` with the wallet's decrypted keypair.
    ///
    /// The keypair is only reachable by reference inside `f`; the plaintext
    /// buffer is zeroed before this returns, whatever `f` does.
    #[instrument(skip(self, f))]
    pub async fn with_decrypted_key<T, F>(&self, wallet_id: &str, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&Keypair) -> T,
    {
        let record = self.load(wallet_id).await?;
        let mut scratch = [0u8; KEYPAIR_LEN];
        let result = open_record_in(&mut scratch, &record, &self.master_key, f);
        debug!("Released decrypted key scope for wallet {}", wallet_id);
        result
    }

    async fn load(&self, wallet_id: &str) -> Result<EncryptedKeyRecord, VaultError> {
        self.store
            .get(wallet_id)
            .await
            .map_err(|e| VaultError::Storage(e.to_string()))?
            .ok_or_else(|| VaultError::KeyNotFound(wallet_id.to_string()))
    }
}

/// Decrypt `record` into `scratch`, run `f`, and leave `scratch` zeroed.
pub fn open_record_in<T, F>(
    scratch: &mut [u8; KEYPAIR_LEN],
    record: &EncryptedKeyRecord,
    master_key: &MasterKey,
    f: F,
) -> Result<T, VaultError>
where
    F: FnOnce(&Keypair) -> T,
{
    let mut plaintext = WipeOnDrop::new(&mut scratch[..]);
    crypto::decrypt_in_place(&record.ciphertext, master_key, &mut plaintext)?;

    let keypair = Keypair::from_bytes(&plaintext)
        .map_err(|_| VaultError::Crypto("decrypted key material is malformed".to_string()))?;
    if keypair.pubkey() != record.public_key {
        return Err(VaultError::Crypto(
            "decrypted key does not match the wallet public key".to_string(),
        ));
    }

    Ok(f(&keypair))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::storage::InMemoryKeyStore;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn vault() -> KeyVault {
        KeyVault::new(Arc::new(InMemoryKeyStore::new()), MasterKey::generate())
    }

    fn sealed_record(master: &MasterKey) -> (EncryptedKeyRecord, Pubkey) {
        let keypair = Keypair::new();
        let secret = Zeroizing::new(keypair.to_bytes());
        let record = EncryptedKeyRecord {
            wallet_id: "scoped".to_string(),
            public_key: keypair.pubkey(),
            ciphertext: crypto::encrypt(secret.as_slice(), master).unwrap(),
            created_at: 0,
        };
        (record, keypair.pubkey())
    }

    #[test]
    fn test_generated_keypairs_are_unique() {
        let a = KeyVault::generate_keypair();
        let b = KeyVault::generate_keypair();
        assert_ne!(a.pubkey(), b.pubkey());
        assert_ne!(a.to_bytes().to_vec(), b.to_bytes().to_vec());
    }

    #[tokio::test]
    async fn test_create_wallet_and_sign() {
        let vault = vault();
        let created = vault.create_wallet("user-1").await.unwrap();

        assert_eq!(created.public_key, created.record.public_key);
        assert_eq!(vault.public_key("user-1").await.unwrap(), created.public_key);

        let message = b"authorize swap";
        let (signer, signature) = vault
            .with_decrypted_key("user-1", |keypair| (keypair.pubkey(), keypair.sign_message(message)))
            .await
            .unwrap();

        assert_eq!(signer, created.public_key);
        assert!(signature.verify(created.public_key.as_ref(), message));
    }

    #[tokio::test]
    async fn test_ciphertext_does_not_contain_plaintext_key() {
        let vault = vault();
        let created = vault.create_wallet("user-1").await.unwrap();

        let secret = vault
            .with_decrypted_key("user-1", |keypair| keypair.to_bytes().to_vec())
            .await
            .unwrap();

        assert!(!created
            .record
            .ciphertext
            .windows(secret.len())
            .any(|window| window == secret.as_slice()));
    }

    #[tokio::test]
    async fn test_duplicate_wallet_is_rejected() {
        let vault = vault();
        vault.create_wallet("dup").await.unwrap();
        let result = vault.create_wallet("dup").await;
        assert!(matches!(result, Err(VaultError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_missing_wallet() {
        let vault = vault();
        let result = vault.with_decrypted_key("ghost", |kp| kp.pubkey()).await;
        assert!(matches!(result, Err(VaultError::KeyNotFound(id)) if id == "ghost"));

        assert!(matches!(vault.remove_wallet("ghost").await, Err(VaultError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_wallet() {
        let vault = vault();
        vault.create_wallet("temp").await.unwrap();
        vault.remove_wallet("temp").await.unwrap();
        assert!(matches!(vault.public_key("temp").await, Err(VaultError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_crypto_error() {
        let store: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new());
        let original = KeyVault::new(store.clone(), MasterKey::generate());
        original.create_wallet("user-1").await.unwrap();

        let other = KeyVault::new(store, MasterKey::generate());
        let result = other.with_decrypted_key("user-1", |kp| kp.pubkey()).await;
        assert!(matches!(result, Err(VaultError::Crypto(_))));
    }

    #[test]
    fn test_scratch_is_zeroed_after_success() {
        let master = MasterKey::generate();
        let (record, pubkey) = sealed_record(&master);
        let mut scratch = [0u8; KEYPAIR_LEN];

        let seen = open_record_in(&mut scratch, &record, &master, |kp| kp.pubkey()).unwrap();

        assert_eq!(seen, pubkey);
        assert!(scratch.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_scratch_is_zeroed_when_closure_fails() {
        let master = MasterKey::generate();
        let (record, _) = sealed_record(&master);
        let mut scratch = [0u8; KEYPAIR_LEN];

        let outcome: Result<Result<(), String>, VaultError> =
            open_record_in(&mut scratch, &record, &master, |_| Err("signing refused".to_string()));

        assert_eq!(outcome.unwrap(), Err("signing refused".to_string()));
        assert!(scratch.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_scratch_is_zeroed_when_closure_panics() {
        let master = MasterKey::generate();
        let (record, _) = sealed_record(&master);
        let mut scratch = [0u8; KEYPAIR_LEN];

        let unwound = catch_unwind(AssertUnwindSafe(|| {
            open_record_in(&mut scratch, &record, &master, |_| -> () { panic!("boom") })
        }));

        assert!(unwound.is_err());
        assert!(scratch.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_scratch_is_zeroed_on_tampered_record() {
        let master = MasterKey::generate();
        let (mut record, _) = sealed_record(&master);
        record.ciphertext[30] ^= 0x80;
        let mut scratch = [0u8; KEYPAIR_LEN];

        let result = open_record_in(&mut scratch, &record, &master, |kp| kp.pubkey());

        assert!(matches!(result, Err(VaultError::Crypto(_))));
        assert!(scratch.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_swapped_public_key_is_rejected() {
        let master = MasterKey::generate();
        let (mut record, _) = sealed_record(&master);
        record.public_key = Pubkey::new_unique();
        let mut scratch = [0u8; KEYPAIR_LEN];

        let result = open_record_in(&mut scratch, &record, &master, |kp| kp.pubkey());
        assert!(matches!(result, Err(VaultError::Crypto(_))));
        assert!(scratch.iter().all(|b| *b == 0));
    }
}
