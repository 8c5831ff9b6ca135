//! Cryptographic primitives for sealed message envelopes.
//!
//! Uses secp256k1 ECDH for key agreement and ChaCha20-Poly1305 for sealing.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use secp256k1::ecdh::SharedSecret;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Nonce size for ChaCha20-Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305.
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("sealed data too short")]
    Truncated,
}

/// Derive a 32-byte sealing key from an ECDH shared secret.
pub fn derive_envelope_key(shared: &SharedSecret) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(shared.secret_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Generate a random nonce.
fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seal data using ChaCha20-Poly1305.
///
/// Returns: nonce (12 bytes) || ciphertext || tag (16 bytes)
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Encrypt)?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    // Prepend nonce to ciphertext
    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open sealed data.
///
/// Input format: nonce (12 bytes) || ciphertext || tag (16 bytes)
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated);
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::Decrypt)?;

    let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
    let ciphertext = &sealed[NONCE_SIZE..];

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Decrypt)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_secret() -> SharedSecret {
        let secret = secp256k1::SecretKey::new(&mut OsRng);
        let public = secp256k1::PublicKey::from_secret_key_global(&secret);
        SharedSecret::new(&public, &secret)
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = derive_envelope_key(&shared_secret());
        let sealed = seal(&key, b"hello").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + TAG_SIZE);
        assert_eq!(open(&key, &sealed).unwrap().as_slice(), b"hello");
    }

    #[test]
    fn open_rejects_wrong_key() {
        let key = derive_envelope_key(&shared_secret());
        let other = derive_envelope_key(&shared_secret());
        let sealed = seal(&key, b"hello").unwrap();
        assert!(matches!(open(&other, &sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn open_rejects_tampered_data() {
        let key = derive_envelope_key(&shared_secret());
        let mut sealed = seal(&key, b"hello").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(open(&key, &sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn open_rejects_truncated_data() {
        let key = derive_envelope_key(&shared_secret());
        assert!(matches!(open(&key, &[0u8; 10]), Err(CryptoError::Truncated)));
    }
}
