//! Fingerprint hashing and field normalization
//!
//! Fingerprints are computed from normalized, bounded fields only. The hash
//! is a 32-bit djb2-xor mix; collisions only cause under-reporting.

use crate::runtime::id::to_base36;

/// djb2-xor over the characters of `input`, consumed from the end
pub fn hash32(input: &str) -> u32 {
    input
        .chars()
        .rev()
        .fold(5381u32, |hash, c| hash.wrapping_mul(33) ^ (c as u32))
}

/// Fingerprint of `|`-joined parts in base36
pub fn fingerprint(parts: &[&str]) -> String {
    to_base36(hash32(&parts.join("|")) as u128)
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((index, _)) => value[..index].to_string(),
        None => value.to_string(),
    }
}

/// Last path segment with query and fragment removed
pub fn basename(path: &str) -> &str {
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    match without_query.rsplit(['/', '\\']).next() {
        Some(name) if !name.is_empty() => name,
        _ => path,
    }
}

/// First `n` lines of a multi-line text
pub fn first_lines(text: &str, n: usize) -> String {
    text.split('\n').take(n).collect::<Vec<_>>().join("\n")
}
