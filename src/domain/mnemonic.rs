//! Mnemonic generation, validation and root key derivation.

use bip32::{Prefix, XPrv};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

/// Why an entered mnemonic is not (yet) valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MnemonicError {
    /// Not enough words accepted yet, or a word is mid-entry.
    #[error("mnemonic entry is incomplete")]
    Incomplete,
    /// The number of words does not form a valid mnemonic.
    #[error("invalid mnemonic word count")]
    WordCount,
    /// The checksum does not match the words.
    #[error("mnemonic checksum mismatch")]
    Checksum,
    /// A word is not in the wordlist.
    #[error("word not in the wordlist")]
    UnknownWord,
}

/// Generate a new 24-word mnemonic.
pub fn generate() -> bip32::Mnemonic {
    let mut entropy = [0u8; 32]; // 256 bits for 24 words
    OsRng.fill_bytes(&mut entropy);
    bip32::Mnemonic::from_entropy(entropy, bip32::Language::English)
}

/// Validate a mnemonic given as individual words.
///
/// Anything below 12 words is a word-count failure; at 12 words and up the
/// count must be one of the standard lengths and the checksum must match.
pub fn validate(words: &[&str]) -> Result<(), MnemonicError> {
    if words.len() < 12 {
        return Err(MnemonicError::WordCount);
    }
    match bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &words.join(" ")) {
        Ok(_) => Ok(()),
        Err(bip39::Error::InvalidChecksum) => Err(MnemonicError::Checksum),
        Err(bip39::Error::UnknownWord(_)) => Err(MnemonicError::UnknownWord),
        Err(_) => Err(MnemonicError::WordCount),
    }
}

/// Parse a space-separated phrase into a validated mnemonic.
pub fn parse(phrase: &str) -> Result<bip32::Mnemonic, MnemonicError> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    validate(&words)?;
    bip32::Mnemonic::new(words.join(" "), bip32::Language::English)
        .map_err(|_| MnemonicError::UnknownWord)
}

/// Derive the Base58 root xprv for a phrase, using an empty BIP39 passphrase.
pub fn root_xprv(phrase: &str) -> Result<Zeroizing<String>, MnemonicError> {
    let mnemonic = parse(phrase)?;
    let seed = mnemonic.to_seed("");
    let xprv = XPrv::new(seed.as_bytes()).expect("64-byte seed");
    Ok(xprv.to_string(Prefix::XPRV))
}
