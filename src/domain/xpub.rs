//! Extended public key validation.

use bip32::{Prefix, XPub};

/// Check whether a string is a valid `xpub` extended public key.
///
/// Requires the mainnet public prefix and a correct Base58Check payload;
/// private (`xprv`) strings are not valid here.
pub fn is_valid_xpub(s: &str) -> bool {
    s.starts_with(Prefix::XPUB.as_str()) && s.parse::<XPub>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xpub_is_valid() {
        assert!(is_valid_xpub(
            "xpub68UrM5VsVKymX9zLuvi1ZkAfgTLqd8iLuyzEYU8VprQghHVAkH9es3KVfFyLJkCnnJj1prShvK5GF9wQRvDVUXE7ZuDGgVPZ5C6kALWVfjH"
        ));
    }

    #[test]
    fn xpub_with_modified_checksum_is_not_valid() {
        assert!(!is_valid_xpub(
            "xpub68UrM5VsVKymX9zLuvi1ZkAfgTLqd8iLuyzEYU8VprQghHVAkH9es3KVfFyLJkCnnJj1prShvK5GF9wQRvDVUXE7ZuDGgVPZ5C6kALWVfjh"
        ));
    }

    #[test]
    fn xprv_is_not_valid() {
        assert!(!is_valid_xpub(
            "xprv9uVVwZxyexRUJfusouB1CcDw8RWMDfzVYm4dk5itGWshpVA2CjqQKF11oyoML33sZ4YpUwBTu8YNeawsPF3ctX6DuPmjSDt1rqAcUYVptHR"
        ));
    }

    #[test]
    fn garbage_is_not_valid() {
        assert!(!is_valid_xpub(""));
        assert!(!is_valid_xpub("xpub"));
        assert!(!is_valid_xpub("not an xpub at all"));
    }
}
