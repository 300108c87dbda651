//! Authenticated encryption at rest.
//!
//! The stored format is `nonce(12) || ciphertext || tag(16)`, 28 bytes of
//! overhead per message. The key is the hex-decoded first entry of the
//! configured key list; additional entries are validated and ignored
//! (reserved for rotation).

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::CodecError;

/// Nonce length in bytes.
pub const NONCE_SIZE: usize = 12;
/// GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;
/// Total ciphertext overhead per message.
pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

const HEX_KEY_LEN: usize = 64;

/// Capability seam for the encryption backend.
///
/// Only AES-256-GCM is implemented; the seam leaves room for future
/// backends selected by tag at init time.
pub trait Crypto: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Constructs the crypto backend named by `tag` (case-insensitive).
pub fn new_crypto(tag: &str, hex_keys: &[String]) -> Result<Arc<dyn Crypto>, CodecError> {
    match tag.to_ascii_uppercase().as_str() {
        "AESGCM" => Ok(Arc::new(AesGcmCrypto::new(hex_keys)?)),
        other => Err(CodecError::InvalidKey(format!(
            "unknown crypto type {other}"
        ))),
    }
}

/// AES-256-GCM backend. The cipher handle is immutable after construction
/// and safe for concurrent seal/open.
pub struct AesGcmCrypto {
    cipher: Aes256Gcm,
}

impl AesGcmCrypto {
    /// Builds the cipher from a hex-encoded key list. Every entry must be
    /// 64 hex characters; only the first is used.
    pub fn new(hex_keys: &[String]) -> Result<Self, CodecError> {
        let first = hex_keys
            .first()
            .ok_or_else(|| CodecError::InvalidKey("empty key list".to_owned()))?;
        for key in hex_keys {
            if key.len() != HEX_KEY_LEN {
                return Err(CodecError::InvalidKey(format!(
                    "key must be {HEX_KEY_LEN} hex characters, got {}",
                    key.len()
                )));
            }
        }

        let key_bytes =
            hex::decode(first).map_err(|e| CodecError::InvalidKey(format!("not hex: {e}")))?;
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }
}

impl Crypto for AesGcmCrypto {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CodecError::EncryptFailure)?;

        let mut out = Vec::with_capacity(plaintext.len() + OVERHEAD);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CodecError> {
        if ciphertext.len() < OVERHEAD {
            return Err(CodecError::InvalidCiphertext);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CodecError::InvalidCiphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn crypto() -> AesGcmCrypto {
        AesGcmCrypto::new(&[TEST_KEY.to_owned()]).unwrap()
    }

    #[test]
    fn roundtrip() {
        let c = crypto();
        for plaintext in [&b""[..], b"a", b"some longer plaintext payload"] {
            let sealed = c.encrypt(plaintext).unwrap();
            assert_eq!(sealed.len(), plaintext.len() + OVERHEAD);
            assert_eq!(c.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn distinct_nonces_per_encryption() {
        let c = crypto();
        let a = c.encrypt(b"same plaintext").unwrap();
        let b = c.encrypt(b"same plaintext").unwrap();
        assert_ne!(&a[..NONCE_SIZE], &b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_short_ciphertext() {
        let c = crypto();
        assert!(matches!(
            c.decrypt(&[0u8; OVERHEAD - 1]),
            Err(CodecError::InvalidCiphertext)
        ));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let c = crypto();
        let mut sealed = c.encrypt(b"authentic").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(matches!(
            c.decrypt(&sealed),
            Err(CodecError::InvalidCiphertext)
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let other_key = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
        let a = crypto();
        let b = AesGcmCrypto::new(&[other_key.to_owned()]).unwrap();
        let sealed = a.encrypt(b"secret").unwrap();
        assert!(b.decrypt(&sealed).is_err());
    }

    #[test]
    fn key_validation() {
        assert!(AesGcmCrypto::new(&[]).is_err());
        assert!(AesGcmCrypto::new(&["deadbeef".to_owned()]).is_err());
        assert!(AesGcmCrypto::new(&["zz".repeat(32)]).is_err());

        // Extra keys are validated but ignored.
        let extra = "00".repeat(32);
        assert!(AesGcmCrypto::new(&[TEST_KEY.to_owned(), extra]).is_ok());
        assert!(AesGcmCrypto::new(&[TEST_KEY.to_owned(), "short".to_owned()]).is_err());
    }

    #[test]
    fn tag_selection() {
        assert!(new_crypto("AesGcm", &[TEST_KEY.to_owned()]).is_ok());
        assert!(new_crypto("AESGCM", &[TEST_KEY.to_owned()]).is_ok());
        assert!(new_crypto("rot13", &[TEST_KEY.to_owned()]).is_err());
    }
}
