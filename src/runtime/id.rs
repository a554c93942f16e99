//! Opaque identifier generation

use chrono::Utc;
use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Render an unsigned integer in lowercase base36
pub fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(25);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    // Only ASCII digits and letters were pushed
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a compact, URL-safe correlation id.
///
/// A random component followed by the current epoch-ms, both base36. Good
/// enough to correlate sessions and pages; not a security token.
pub fn gen_id() -> String {
    let random = (Uuid::new_v4().as_u128() >> 64) as u64;
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    format!("{}{}", to_base36(random as u128), to_base36(millis))
}
