//! Session-unique identifiers.
//!
//! An id is the current time in milliseconds followed by a random suffix,
//! both in base 36. Two ids from the same process collide only if they are
//! minted in the same millisecond *and* draw the same 64-bit suffix, so
//! uniqueness is probabilistic rather than enforced. Ids are not secrets and
//! must not be used as such.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let suffix: u64 = rand::rng().random();

    let mut id = to_base36(millis);
    id.push_str(&to_base36(suffix));
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
