//! # Temporary Passwords
//!
//! Generates the initial password for a newly created login role.
//!
//! Every password contains at least one uppercase letter, one lowercase
//! letter, one digit and one symbol. The remaining characters are drawn
//! uniformly from the union of those classes and the result is shuffled,
//! all from the operating system's CSPRNG.

use crate::constants::{DEFAULT_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use zeroize::Zeroizing;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
/// No quotes, backslashes, `@`, `:` or `/`; those break SQL literals and connection URLs
pub const SYMBOLS: &[u8] = b"!#$%&*+-=?^_~";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("password length {0} is too short, at least {MIN_PASSWORD_LENGTH} characters are required")]
pub struct PasswordLengthError(pub usize);

/// Generate a password of the default length
///
/// # Errors
///
/// Never fails in practice; the default length is above the minimum.
pub fn generate_default() -> Result<Zeroizing<String>, PasswordLengthError> {
    generate_temp_password(DEFAULT_PASSWORD_LENGTH)
}

/// Generate a password of exactly `length` characters
///
/// # Errors
///
/// Returns [`PasswordLengthError`] when `length` is below 4, since there
/// would be no room for every required character class.
pub fn generate_temp_password(length: usize) -> Result<Zeroizing<String>, PasswordLengthError> {
    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordLengthError(length));
    }

    let mut rng = OsRng;
    let alphabet: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();

    let mut chars = Zeroizing::new(Vec::with_capacity(length));
    for class in [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS] {
        if let Some(c) = class.choose(&mut rng) {
            chars.push(*c);
        }
    }
    while chars.len() < length {
        if let Some(c) = alphabet.choose(&mut rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(&mut rng);

    Ok(Zeroizing::new(chars.iter().map(|&b| char::from(b)).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_all_classes(password: &str) -> bool {
        password.chars().any(|c| c.is_ascii_uppercase())
            && password.chars().any(|c| c.is_ascii_lowercase())
            && password.chars().any(|c| c.is_ascii_digit())
            && password.bytes().any(|b| SYMBOLS.contains(&b))
    }

    #[test]
    fn test_default_length() {
        let password = generate_default().unwrap();
        assert_eq!(password.len(), DEFAULT_PASSWORD_LENGTH);
    }

    #[test]
    fn test_length_and_classes_for_many_lengths() {
        for length in MIN_PASSWORD_LENGTH..64 {
            for _ in 0..20 {
                let password = generate_temp_password(length).unwrap();
                assert_eq!(password.len(), length, "wrong length for {length}");
                assert!(
                    has_all_classes(&password),
                    "password of length {length} is missing a character class"
                );
            }
        }
    }

    #[test]
    fn test_only_known_characters() {
        let password = generate_temp_password(200).unwrap();
        for b in password.bytes() {
            assert!(
                UPPERCASE.contains(&b)
                    || LOWERCASE.contains(&b)
                    || DIGITS.contains(&b)
                    || SYMBOLS.contains(&b),
                "unexpected character {:?}",
                char::from(b)
            );
        }
        assert!(!password.contains('\''), "quotes must never be generated");
    }

    #[test]
    fn test_too_short_is_rejected() {
        for length in 0..MIN_PASSWORD_LENGTH {
            assert_eq!(generate_temp_password(length), Err(PasswordLengthError(length)));
        }
    }

    #[test]
    fn test_guaranteed_classes_are_shuffled() {
        // With a fixed order the first character would always be uppercase
        let not_upper_first = (0..200)
            .filter_map(|_| generate_temp_password(4).ok())
            .any(|p| !p.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
        assert!(not_upper_first, "guaranteed characters must not keep a fixed position");
    }
}
