//! Salted SHA-256 password digests stored as `salt$digest` (both hex).

use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(expected)) else {
        return false;
    };
    constant_time_eq(&digest_bytes(&salt, password), &expected)
}

fn digest(salt: &[u8], password: &str) -> String {
    hex::encode(digest_bytes(salt, password))
}

fn digest_bytes(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Touches every byte regardless of where the first mismatch is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("hunter22");
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", "no-separator"));
        assert!(!verify_password("x", "zz$abc"));
    }

    #[test]
    fn test_digest_compared_as_bytes() {
        let stored = hash_password("hunter22");
        let (salt, digest) = stored.split_once('$').unwrap();

        // Hex case does not matter, truncation does
        assert!(verify_password("hunter22", &format!("{}${}", salt, digest.to_uppercase())));
        assert!(!verify_password("hunter22", &format!("{}${}", salt, &digest[..62])));
        assert!(!verify_password("hunter22", &format!("{}$", salt)));

        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
