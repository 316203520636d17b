//! Symmetric encryption for secrets stored at rest.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption key must be base64 encoding of 32 bytes")]
    InvalidKey,
    #[error("Failed to generate nonce: {0}")]
    Nonce(String),
    #[error("Encryption failed")]
    Encrypt,
    #[error("Ciphertext is malformed or was tampered with")]
    Decrypt,
}

/// AES-256-GCM encryption of short strings.
///
/// Output layout is `base64(nonce || ciphertext || tag)` with a fresh random
/// 12-byte nonce per call, so encrypting the same input twice yields
/// different ciphertexts.
#[derive(Clone)]
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Creates the service from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &str) -> Result<Self, EncryptionError> {
        let bytes = STANDARD
            .decode(key.trim())
            .map_err(|_| EncryptionError::InvalidKey)?;
        Self::from_key_bytes(&bytes)
    }

    pub fn from_key_bytes(key: &[u8]) -> Result<Self, EncryptionError> {
        if key.len() != 32 {
            return Err(EncryptionError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|e| EncryptionError::Nonce(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| EncryptionError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, EncryptionError> {
        let data = STANDARD
            .decode(encoded)
            .map_err(|_| EncryptionError::Decrypt)?;
        if data.len() <= NONCE_LEN {
            return Err(EncryptionError::Decrypt);
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| EncryptionError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| EncryptionError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EncryptionService {
        EncryptionService::from_key_bytes(&[42u8; 32]).unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let svc = service();
        let sealed = svc.encrypt("ghp_secret_token").unwrap();
        assert_ne!(sealed, "ghp_secret_token");
        assert_eq!(svc.decrypt(&sealed).unwrap(), "ghp_secret_token");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let svc = service();
        assert_ne!(svc.encrypt("same").unwrap(), svc.encrypt("same").unwrap());
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let svc = service();
        let sealed = svc.encrypt("token").unwrap();
        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            svc.decrypt(&STANDARD.encode(bytes)),
            Err(EncryptionError::Decrypt)
        ));
    }

    #[test]
    fn test_short_input_is_rejected() {
        let svc = service();
        assert!(svc.decrypt(&STANDARD.encode([0u8; 8])).is_err());
        assert!(svc.decrypt("***").is_err());
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let sealed = service().encrypt("token").unwrap();
        let other = EncryptionService::from_key_bytes(&[1u8; 32]).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_key_length_is_checked() {
        assert!(EncryptionService::from_key_bytes(&[0u8; 16]).is_err());
        assert!(EncryptionService::from_base64_key("not-base64").is_err());
        assert!(EncryptionService::from_base64_key(&STANDARD.encode([0u8; 32])).is_ok());
    }
}
