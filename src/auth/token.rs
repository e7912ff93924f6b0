use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use sha2::{Digest, Sha256};

/// A freshly minted bearer token. Only `hash` is ever persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plain: String,
    pub hash: String,
}

pub fn issue_token(length: usize) -> IssuedToken {
    let plain: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    let hash = hash_token(&plain);
    IssuedToken { plain, hash }
}

/// Hex-encoded SHA-256, the form stored in `api_token_hash`.
pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}
