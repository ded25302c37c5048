//! Content fingerprints.
//!
//! A fingerprint is a short hex digest used for cheap equality checks
//! (did this page change since the client last saw it?). It is
//! deterministic across runs and platforms but not cryptographic.

use xxhash_rust::xxh3::xxh3_128;

/// Returns the fingerprint of `content` as 32 lowercase hex characters.
pub fn fingerprint(content: &[u8]) -> String {
    format!("{:032x}", xxh3_128(content))
}
