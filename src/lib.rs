//! NovaWallet core - the non-UI logic of the NovaWallet mobile wallet.
//!
//! This library provides:
//! - Base16 (hex) encoding and decoding for keys, addresses and envelopes
//! - Asymmetric message envelopes with a hex wire format
//! - Mnemonic entry on a numeric keypad, validation and root key derivation
//! - Extended public key validation
//! - An Electrum server client for balances and block heights

pub mod domain;
pub mod infra;
