//! Card data encryption.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The stored form is
//! `base64(nonce || ciphertext || tag)`, so equal plaintexts never produce
//! equal ciphertexts and tampering is detected on decrypt.
//!
//! Empty or absent input maps to `None` in both directions: there is no
//! ciphertext for "no value".

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

use crate::config::EncryptionConfig;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors from the encryption service.
///
/// Messages never include plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,

    #[error("stored value is not valid base64")]
    InvalidEncoding,

    #[error("ciphertext too short")]
    Truncated,

    #[error("decryption failed (wrong key or tampered data)")]
    Decrypt,

    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Encrypts and decrypts sensitive strings with a key fixed at startup.
#[derive(Clone)]
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService").finish_non_exhaustive()
    }
}

impl EncryptionService {
    /// Build the service from startup configuration.
    #[must_use]
    pub fn new(config: &EncryptionConfig) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(config.key())),
        }
    }

    /// Encrypt `plaintext`, returning `None` for absent or empty input.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encrypt` if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        let Some(plaintext) = plaintext.filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(Some(base64::engine::general_purpose::STANDARD.encode(&blob)))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns a `CryptoError` if the value is malformed, was encrypted under
    /// a different key, or has been modified.
    pub fn decrypt(&self, encoded: Option<&str>) -> Result<Option<String>, CryptoError> {
        let Some(encoded) = encoded.filter(|e| !e.is_empty()) else {
            return Ok(None);
        };

        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidEncoding)?;

        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| CryptoError::InvalidUtf8)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(seed: u8) -> EncryptionService {
        let mut key = [0u8; crate::config::KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = seed.wrapping_add(u8::try_from(i).unwrap().wrapping_mul(31));
        }
        EncryptionService::new(&EncryptionConfig::from_bytes(key))
    }

    #[test]
    fn test_round_trip() {
        let crypto = service(1);
        for plaintext in ["4111111111111111", "123", "Ünïcødé holder", " "] {
            let encrypted = crypto.encrypt(Some(plaintext)).unwrap().unwrap();
            assert_ne!(encrypted, plaintext);
            assert_eq!(crypto.decrypt(Some(&encrypted)).unwrap().as_deref(), Some(plaintext));
        }
    }

    #[test]
    fn test_absent_and_empty_map_to_none() {
        let crypto = service(1);
        assert_eq!(crypto.encrypt(None).unwrap(), None);
        assert_eq!(crypto.encrypt(Some("")).unwrap(), None);
        assert_eq!(crypto.decrypt(None).unwrap(), None);
        assert_eq!(crypto.decrypt(Some("")).unwrap(), None);
    }

    #[test]
    fn test_equal_plaintexts_do_not_leak_equality() {
        let crypto = service(1);
        let a = crypto.encrypt(Some("4111111111111111")).unwrap();
        let b = crypto.encrypt(Some("4111111111111111")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = service(1).encrypt(Some("737")).unwrap().unwrap();
        assert_eq!(
            service(2).decrypt(Some(&encrypted)),
            Err(CryptoError::Decrypt)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let crypto = service(1);
        let encrypted = crypto.encrypt(Some("4111111111111111")).unwrap().unwrap();
        let mut blob = base64::engine::general_purpose::STANDARD
            .decode(&encrypted)
            .unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&blob);
        assert_eq!(crypto.decrypt(Some(&tampered)), Err(CryptoError::Decrypt));
    }

    #[test]
    fn test_malformed_input() {
        let crypto = service(1);
        assert_eq!(
            crypto.decrypt(Some("not base64 at all!")),
            Err(CryptoError::InvalidEncoding)
        );
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 8]);
        assert_eq!(crypto.decrypt(Some(&short)), Err(CryptoError::Truncated));
    }
}
