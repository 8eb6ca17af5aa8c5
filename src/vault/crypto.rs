//! Authenticated encryption of wallet secret keys.
//!
//! Envelope format (version 1):
//! [ Version: u8 (1) ]
//! [ Nonce: 24B (XChaCha20) ]
//! [ Ciphertext + Poly1305 tag: N + 16 ]

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadInPlace, KeyInit};
use chacha20poly1305::{Key, Tag, XChaCha20Poly1305, XNonce};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use std::ops::{Deref, DerefMut};
use zeroize::{Zeroize, Zeroizing};

use crate::error::VaultError;

pub const MASTER_KEY_LEN: usize = 32;
const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Symmetric key protecting every stored wallet key. Never printed, never serialized.
#[derive(Debug)]
pub struct MasterKey(SecretBox<[u8; MASTER_KEY_LEN]>);

impl MasterKey {
    /// Build from raw bytes; anything other than 32 bytes is a `Crypto` error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(VaultError::Crypto(format!(
                "master key must be {} bytes, got {}",
                MASTER_KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(bytes);
        let secret = SecretBox::new(Box::new(key));
        key.zeroize();
        Ok(Self(secret))
    }

    /// Decode a base64 (standard or URL-safe alphabet) master key.
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let trimmed = encoded.trim();
        let decoded = STANDARD
            .decode(trimmed)
            .or_else(|_| URL_SAFE.decode(trimmed))
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Crypto("master key is not valid base64".to_string()))?;
        Self::from_bytes(&decoded)
    }

    /// Read a base64 master key from the given environment variable.
    pub fn from_env(var: &str) -> Result<Self, VaultError> {
        let encoded = Zeroizing::new(
            std::env::var(var).map_err(|_| VaultError::Crypto(format!("{var} is not set")))?,
        );
        Self::from_base64(&encoded)
    }

    /// Fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let secret = SecretBox::new(Box::new(key));
        key.zeroize();
        Self(secret)
    }

    /// Base64 export, for provisioning a freshly generated key.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.0.expose_secret()))
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.0.expose_secret()))
    }
}

/// Zeroes the borrowed buffer when dropped, on every exit path including unwinding.
pub struct WipeOnDrop<'a> {
    buf: &'a mut [u8],
}

impl<'a> WipeOnDrop<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }
}

impl Deref for WipeOnDrop<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf
    }
}

impl DerefMut for WipeOnDrop<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf
    }
}

impl Drop for WipeOnDrop<'_> {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// Encrypt secret key material under the master key.
pub fn encrypt(secret: &[u8], master_key: &MasterKey) -> Result<Vec<u8>, VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let sealed = master_key
        .cipher()
        .encrypt(XNonce::from_slice(&nonce), secret)
        .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(HEADER_LEN + sealed.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Decrypt an envelope into a buffer that zeroes itself on drop.
pub fn decrypt(envelope: &[u8], master_key: &MasterKey) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let (nonce, body) = split_envelope(envelope)?;
    master_key
        .cipher()
        .decrypt(XNonce::from_slice(nonce), body)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Crypto("ciphertext failed authentication".to_string()))
}

/// Decrypt directly into `out`, whose length must equal the plaintext length.
/// On any failure `out` is left zeroed.
pub fn decrypt_in_place(
    envelope: &[u8],
    master_key: &MasterKey,
    out: &mut [u8],
) -> Result<(), VaultError> {
    let (nonce, body) = split_envelope(envelope)?;
    let (ciphertext, tag) = body.split_at(body.len() - TAG_LEN);
    if ciphertext.len() != out.len() {
        out.zeroize();
        return Err(VaultError::Crypto(
            "ciphertext has unexpected length".to_string(),
        ));
    }

    out.copy_from_slice(ciphertext);
    master_key
        .cipher()
        .decrypt_in_place_detached(XNonce::from_slice(nonce), b"", out, Tag::from_slice(tag))
        .map_err(|_| {
            out.zeroize();
            VaultError::Crypto("ciphertext failed authentication".to_string())
        })
}

fn split_envelope(envelope: &[u8]) -> Result<(&[u8], &[u8]), VaultError> {
    if envelope.len() < HEADER_LEN + TAG_LEN {
        return Err(VaultError::Crypto("ciphertext is truncated".to_string()));
    }
    if envelope[0] != ENVELOPE_VERSION {
        return Err(VaultError::Crypto(format!(
            "unsupported envelope version {}",
            envelope[0]
        )));
    }
    Ok((&envelope[1..HEADER_LEN], &envelope[HEADER_LEN..]))
}
