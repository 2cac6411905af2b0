use sha2::{Digest, Sha256};

/// Short, stable stand-in for a search term in logs.
///
/// Terms are phone numbers and names, so they are never logged raw. The
/// fingerprint is the first 12 hex chars of the SHA-256 of the trimmed term,
/// enough to correlate repeated searches across log lines.
pub fn term_fingerprint(term: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(term.trim().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(12);
    digest
}
