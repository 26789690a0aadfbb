//! Blake3 hashing helpers.
//!
//! Used to fingerprint resolution plans so callers can tell whether two runs
//! produced the same result without comparing every entry.

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// Hash an ordered sequence of fields
///
/// Every field is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = blake3::Hasher::new();
    for field in fields {
        let bytes = field.as_ref().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}
