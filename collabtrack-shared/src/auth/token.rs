/// One-time token generation
///
/// Email verification and password reset links carry a random token. The
/// database keeps only its SHA-256 digest (see `models::auth_token`), so a
/// leaked table cannot be replayed as links.
///
/// # Format
///
/// 64 lowercase hex characters (32 random bytes).
///
/// # Example
///
/// ```
/// use collabtrack_shared::auth::token::{generate_token, hash_token, is_well_formed};
///
/// let (token, hash) = generate_token();
/// assert!(is_well_formed(&token));
/// assert_eq!(hash_token(&token), hash);
/// ```

use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Length of a token in characters
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Generates a token and returns `(plaintext, sha256_hex)`
pub fn generate_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = hex::encode(bytes);
    let hash = hash_token(&token);

    (token, hash)
}

/// SHA-256 of the token, hex encoded
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check before touching the database
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let (token1, hash1) = generate_token();
        let (token2, hash2) = generate_token();

        assert_eq!(token1.len(), TOKEN_LENGTH);
        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_token_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_is_well_formed() {
        let (token, _) = generate_token();
        assert!(is_well_formed(&token));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"z".repeat(TOKEN_LENGTH)));
    }
}
