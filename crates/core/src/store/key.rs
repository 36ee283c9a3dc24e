//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request identity (method + URL).
///
/// Only GET requests are ever cached, but the method participates in the
/// key so a future method can never collide with an existing entry.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
