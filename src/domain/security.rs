//! Asymmetric message envelopes with a hex wire format.
//!
//! A `Security` value holds a keypair and publishes its public key as a hex
//! string. Anyone holding that string can build an `Encoder` that seals
//! messages for the keypair; the keypair's `Decoder` opens them. Each message
//! uses a fresh ephemeral key, so two envelopes for the same recipient never
//! share key material.
//!
//! Envelope layout (hex-encoded):
//! ephemeral_pub (33 bytes) || nonce (12 bytes) || ciphertext || tag (16 bytes)

use rand::rngs::OsRng;
use secp256k1::{PublicKey, SecretKey, ecdh::SharedSecret};
use thiserror::Error;

use super::base16;
use super::crypto::{self, CryptoError, NONCE_SIZE, TAG_SIZE};

/// Compressed SEC1 public key size.
const PUBLIC_KEY_SIZE: usize = 33;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("malformed hex: {0}")]
    Hex(#[from] base16::DecodeError),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[from] secp256k1::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("envelope too short")]
    TruncatedEnvelope,
    #[error("decoded message is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A keypair whose public half is published as a hex string.
pub struct Security {
    secret: SecretKey,
}

impl Security {
    /// Create a new keypair from OS randomness.
    pub fn new() -> Self {
        Self {
            secret: SecretKey::new(&mut OsRng),
        }
    }

    /// The public key as a lowercase hex string, for handing to an `Encoder`.
    pub fn public_key(&self) -> String {
        let public = PublicKey::from_secret_key_global(&self.secret);
        base16::encode(&public.serialize())
    }

    /// A decoder for envelopes sealed against this keypair.
    pub fn decoder(&self) -> Decoder {
        Decoder {
            secret: self.secret,
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Self::new()
    }
}

/// Seals messages for the holder of a published public key.
pub struct Encoder {
    recipient: PublicKey,
}

impl Encoder {
    /// Build an encoder from a hex-encoded public key.
    pub fn from_public_key(key: &str) -> Result<Self, SecurityError> {
        let bytes = base16::decode(key)?;
        Ok(Self {
            recipient: PublicKey::from_slice(&bytes)?,
        })
    }

    /// Seal a message, returning the hex-encoded envelope.
    pub fn encode(&self, plaintext: &[u8]) -> Result<String, SecurityError> {
        let eph_secret = SecretKey::new(&mut OsRng);
        let eph_pub = PublicKey::from_secret_key_global(&eph_secret);

        let shared = SharedSecret::new(&self.recipient, &eph_secret);
        let key = crypto::derive_envelope_key(&shared);
        let sealed = crypto::seal(&key, plaintext)?;

        let mut envelope = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
        envelope.extend_from_slice(&eph_pub.serialize());
        envelope.extend_from_slice(&sealed);
        Ok(base16::encode(&envelope))
    }

    /// Seal a UTF-8 message.
    pub fn encode_str(&self, message: &str) -> Result<String, SecurityError> {
        self.encode(message.as_bytes())
    }
}

/// Opens envelopes sealed against the owning keypair.
pub struct Decoder {
    secret: SecretKey,
}

impl Decoder {
    /// Open a hex-encoded envelope, returning the plaintext bytes.
    pub fn decode(&self, encoded: &str) -> Result<Vec<u8>, SecurityError> {
        let envelope = base16::decode(encoded)?;
        if envelope.len() < PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(SecurityError::TruncatedEnvelope);
        }

        let eph_pub = PublicKey::from_slice(&envelope[..PUBLIC_KEY_SIZE])?;
        let shared = SharedSecret::new(&eph_pub, &self.secret);
        let key = crypto::derive_envelope_key(&shared);

        let plaintext = crypto::open(&key, &envelope[PUBLIC_KEY_SIZE..])?;
        Ok(plaintext.to_vec())
    }

    /// Open a hex-encoded envelope, returning the plaintext as a string.
    pub fn decode_string(&self, encoded: &str) -> Result<String, SecurityError> {
        Ok(String::from_utf8(self.decode(encoded)?)?)
    }
}
