//! Opaque bearer session tokens.
//!
//! A token is 32 random bytes, URL-safe base64 encoded. Only the SHA-256
//! hex digest of a token is persisted; presenting the token re-derives
//! the digest for the lookup. Leaking the sessions table therefore does
//! not leak usable credentials.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy per token.
const TOKEN_BYTES: usize = 32;

/// Generate a fresh session token and the digest to persist for it.
pub fn generate() -> (String, String) {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut raw);
    let token = URL_SAFE_NO_PAD.encode(raw);
    let digest = hash(&token);
    (token, digest)
}

/// SHA-256 hex digest of a presented token.
pub fn hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
