//! Secret digest
//!
//! Unsalted SHA-256, rendered as 64 lowercase hex characters. Identical
//! secrets always produce identical digests so exposures can be counted
//! across files. This is not a credential-storage control.

use sha2::{Digest, Sha256};

/// Length of a rendered digest in hex characters
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash a plaintext secret
pub fn secret_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_secret_digest_known_value() {
        assert_eq!(
            secret_digest("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_secret_digest_empty_input() {
        assert_eq!(
            secret_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_secret_digest_is_lowercase_hex() {
        let digest = secret_digest("Hunter2!");
        assert_eq!(digest.len(), DIGEST_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    proptest! {
        #[test]
        fn prop_digest_is_deterministic(secret in ".*") {
            prop_assert_eq!(secret_digest(&secret), secret_digest(&secret));
        }

        #[test]
        fn prop_distinct_secrets_have_distinct_digests(a in ".{0,32}", b in ".{0,32}") {
            prop_assume!(a != b);
            prop_assert_ne!(secret_digest(&a), secret_digest(&b));
        }
    }
}
