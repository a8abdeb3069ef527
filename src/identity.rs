//! Content-addressed chunk identity.
//!
//! A chunk's fingerprint is a SHA-256 digest over its provenance and content:
//! `filename`, `filetype`, 1-based `ordinal`, and the text payload, joined
//! with `-` separators. Two chunks with equal fingerprints are the same
//! logical chunk regardless of where they came from.
//!
//! The fingerprint doubles as the reconciliation lookup key, so the upstream
//! chunker and the engine must compute it identically; a chunker that drifts
//! from this formula makes every resubmitted chunk look brand new.

use sha2::{Digest, Sha256};

/// Compute the fingerprint for one chunk.
///
/// Deterministic and collision-resistant; no side effects.
pub fn fingerprint(filename: &str, filetype: &str, ordinal: u32, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(b"-");
    hasher.update(filetype.as_bytes());
    hasher.update(b"-");
    hasher.update(ordinal.to_string().as_bytes());
    hasher.update(b"-");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
