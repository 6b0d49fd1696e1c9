//! Signed redirect tickets.
//!
//! The interception hook cannot show UI synchronously, so a blocked
//! navigation is redirected through a neutral interstitial page carrying
//! the original URL and an HMAC tag over it. The interstitial hands both
//! back over a connection; only a tag produced by this process verifies,
//! so a page that was typed or bookmarked directly cannot fake having
//! gone through interception.
//!
//! The signing key is generated per process and never leaves memory,
//! which also bounds the validity of any outstanding ticket to one
//! process lifetime: a stale signed link dies with the restart.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::hex::{decode_hex, encode_hex};

type HmacSha256 = Hmac<Sha256>;

const SIGNING_KEY_LEN: usize = 32;

/// Signs and verifies redirect tickets under a process-lifetime key.
pub struct RedirectAuthenticator {
    key: [u8; SIGNING_KEY_LEN],
}

impl RedirectAuthenticator {
    /// Generates a fresh signing key.
    pub fn new() -> Self {
        let mut key = [0u8; SIGNING_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    /// Produces the hex-encoded HMAC-SHA256 tag over a URL's UTF-8 bytes.
    pub fn sign(&self, url: &str) -> String {
        let mut mac = self.mac();
        mac.update(url.as_bytes());
        encode_hex(&mac.finalize().into_bytes())
    }

    /// Checks a hex-encoded tag against a URL.
    ///
    /// Malformed hex decodes to an empty tag that simply fails to
    /// verify; the comparison itself is constant-time.
    pub fn verify(&self, url: &str, tag_hex: &str) -> bool {
        let tag = decode_hex(tag_hex).unwrap_or_default();

        let mut mac = self.mac();
        mac.update(url.as_bytes());
        mac.verify_slice(&tag).is_ok()
    }
}

impl Default for RedirectAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RedirectAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("RedirectAuthenticator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.com/page?q=1";

    #[test]
    fn test_sign_then_verify() {
        let authenticator = RedirectAuthenticator::new();
        let tag = authenticator.sign(URL);

        assert!(authenticator.verify(URL, &tag));
    }

    #[test]
    fn test_tag_is_lowercase_hex() {
        let authenticator = RedirectAuthenticator::new();
        let tag = authenticator.sign(URL);

        // SHA-256 tag: 32 bytes, 64 hex digits.
        assert_eq!(tag.len(), 64);
        assert!(tag.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f')));
    }

    #[test]
    fn test_sign_is_deterministic_per_key() {
        let authenticator = RedirectAuthenticator::new();
        assert_eq!(authenticator.sign(URL), authenticator.sign(URL));
    }

    #[test]
    fn test_tag_bound_to_url() {
        let authenticator = RedirectAuthenticator::new();
        let tag = authenticator.sign(URL);

        assert!(!authenticator.verify("http://example.com/other", &tag));
    }

    #[test]
    fn test_tag_bound_to_key() {
        let first = RedirectAuthenticator::new();
        let second = RedirectAuthenticator::new();
        let tag = first.sign(URL);

        assert!(!second.verify(URL, &tag));
    }

    #[test]
    fn test_malformed_hex_fails_closed() {
        let authenticator = RedirectAuthenticator::new();

        assert!(!authenticator.verify(URL, "not-hex!!"));
        assert!(!authenticator.verify(URL, ""));
        assert!(!authenticator.verify(URL, "abc"));
    }

    #[test]
    fn test_truncated_tag_fails() {
        let authenticator = RedirectAuthenticator::new();
        let tag = authenticator.sign(URL);

        assert!(!authenticator.verify(URL, &tag[..32]));
    }

    #[test]
    fn test_debug_redacts_key() {
        let authenticator = RedirectAuthenticator::new();
        let rendered = format!("{authenticator:?}");

        assert!(!rendered.contains("key"));
    }
}
