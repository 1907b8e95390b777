//! Client-side sealing of archive content.
//!
//! Key material is 44 random bytes: a 256-bit AES key followed by a 96-bit
//! GCM nonce. Every shared file gets fresh key material and it is used for
//! exactly one seal, which is what makes carrying the nonce inside the key
//! sound.

use crate::errors::{StoreError, StoreResult};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::Rng;
use std::fmt;

/// Encryption key and nonce.
pub const KEY_BYTE_LENGTH: usize = 44;

const CIPHER_KEY_LENGTH: usize = 32;

/// Single-use key material, exposed externally as URL-safe base64.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Draw fresh key material from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self {
            bytes: random_bytes(KEY_BYTE_LENGTH),
        }
    }

    /// Parse key material from its base64 form.
    ///
    /// Length is not checked here; [`encrypt`] and [`decrypt`] refuse
    /// anything other than [`KEY_BYTE_LENGTH`] bytes.
    pub fn from_base64(encoded: &str) -> StoreResult<Self> {
        let bytes = URL_SAFE
            .decode(encoded)
            .map_err(|err| StoreError::Decode(format!("decoding encryption key: {err}")))?;
        Ok(Self { bytes })
    }

    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn cipher(&self) -> StoreResult<(Aes256Gcm, &[u8])> {
        if self.bytes.len() != KEY_BYTE_LENGTH {
            return Err(StoreError::Crypto(format!(
                "key material must be {KEY_BYTE_LENGTH} bytes, got {}",
                self.bytes.len()
            )));
        }
        let (key, nonce) = self.bytes.split_at(CIPHER_KEY_LENGTH);
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|err| StoreError::Crypto(format!("initiating cipher block: {err}")))?;
        Ok((cipher, nonce))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Seal `plaintext` with AES-256-GCM and no associated data.
pub fn encrypt(plaintext: &[u8], key: &KeyMaterial) -> StoreResult<Vec<u8>> {
    let (cipher, nonce) = key.cipher()?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| StoreError::Crypto("sealing failed".into()))
}

/// Open a sealed blob. Tampered ciphertext and wrong keys both fail
/// authentication and surface as [`StoreError::Crypto`].
pub fn decrypt(ciphertext: &[u8], key: &KeyMaterial) -> StoreResult<Vec<u8>> {
    let (cipher, nonce) = key.cipher()?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::Crypto("decryption failed".into()))
}

/// Seal `plaintext` and confirm the result opens back to the same bytes
/// before anything leaves the machine.
pub fn seal_verified(plaintext: &[u8], key: &KeyMaterial) -> StoreResult<Vec<u8>> {
    let sealed = encrypt(plaintext, key)?;
    let opened = decrypt(&sealed, key)?;
    if opened != plaintext {
        return Err(StoreError::Crypto("inconsistent encryption behavior".into()));
    }
    Ok(sealed)
}

/// `len` bytes from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    bytes
}

/// `len` random bytes rendered as URL-safe base64.
pub fn random_token(len: usize) -> String {
    URL_SAFE.encode(random_bytes(len))
}
