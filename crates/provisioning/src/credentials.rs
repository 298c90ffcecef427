//! Temporary credential generation for newly provisioned identities.
//!
//! The identity provider enforces a minimum length and character mix; the
//! generated credential is handed to the new member out of band and must be
//! changed on first login.

use rand::seq::SliceRandom;
use rand::Rng;

const UPPERCASE: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%&*";

/// Default length for generated credentials. The provider requires at least
/// 16 characters for admin-created identities.
pub const CREDENTIAL_LENGTH: usize = 20;

/// Generate a random credential of `length` characters (minimum 4, one per
/// character class). Ambiguous glyphs like `O`, `0`, `I` and `l` are left
/// out of the alphabets.
pub fn generate_credential(length: usize) -> String {
    let length = length.max(4);
    let mut rng = rand::rng();

    let mut chars: Vec<char> = Vec::with_capacity(length);
    for class in [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS] {
        chars.push(class[rng.random_range(0..class.len())] as char);
    }

    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();
    while chars.len() < length {
        chars.push(all[rng.random_range(0..all.len())] as char);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}
