//! Base16 (hex) encoding and decoding.
//!
//! Keys, addresses and sealed envelopes travel through the app as lowercase
//! hex strings; this module is the single codec for that representation.

use thiserror::Error;

/// A decode failure, distinguishable by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input has an odd number of characters, so the trailing character
    /// cannot form a byte pair.
    #[error("odd hex string length {0}")]
    InvalidLength(usize),

    /// The input contains a character outside `0-9a-fA-F`.
    #[error("invalid hex character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as a lowercase hex string, two characters per byte,
/// high nibble first.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decode a hex string into bytes.
///
/// Accepts both lowercase and uppercase digits. The length check runs before
/// any byte is produced; the first character outside the hex alphabet fails
/// the whole decode.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let char_count = text.chars().count();
    if char_count % 2 != 0 {
        return Err(DecodeError::InvalidLength(char_count));
    }

    let mut bytes = Vec::with_capacity(char_count / 2);
    let mut high: Option<u8> = None;
    for (position, character) in text.char_indices() {
        let nibble = hex_value(character)
            .ok_or(DecodeError::InvalidCharacter { character, position })?;
        match high.take() {
            None => high = Some(nibble),
            Some(h) => bytes.push(h << 4 | nibble),
        }
    }
    Ok(bytes)
}

fn hex_value(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        'a'..='f' => Some(c as u8 - b'a' + 10),
        'A'..='F' => Some(c as u8 - b'A' + 10),
        _ => None,
    }
}
