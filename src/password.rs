//! Random password generation.
//!
//! Two profiles: issued-user passwords take the full character set, the
//! rotated admin password additionally drops characters that are easy to
//! misread or that tend to break copy/paste into shells and config files.

use rand::seq::SliceRandom;
use rand::Rng;

/// Length of every generated password.
pub const PASSWORD_LENGTH: usize = 64;

const DIGIT_COUNT: usize = 10;
const SYMBOL_COUNT: usize = 10;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}<>:;,.?/";
const AMBIGUOUS: &[u8] = b"lI1O0";

/// Password for a freshly issued Nexus Repository user.
#[must_use]
pub fn user_password() -> String {
    generate(false)
}

/// Replacement admin password used by rotation.
#[must_use]
pub fn rotation_password() -> String {
    generate(true)
}

fn generate(exclude_ambiguous: bool) -> String {
    let mut rng = rand::thread_rng();
    let mut chars: Vec<char> = Vec::with_capacity(PASSWORD_LENGTH);

    let letters: Vec<u8> = LOWER.iter().chain(UPPER.iter()).copied().collect();

    push_from(&mut chars, &mut rng, DIGITS, DIGIT_COUNT, exclude_ambiguous);
    push_from(&mut chars, &mut rng, SYMBOLS, SYMBOL_COUNT, exclude_ambiguous);
    push_from(
        &mut chars,
        &mut rng,
        &letters,
        PASSWORD_LENGTH - DIGIT_COUNT - SYMBOL_COUNT,
        exclude_ambiguous,
    );

    chars.shuffle(&mut rng);
    chars.into_iter().collect()
}

fn push_from(
    out: &mut Vec<char>,
    rng: &mut impl Rng,
    set: &[u8],
    count: usize,
    exclude_ambiguous: bool,
) {
    let pool: Vec<u8> = set
        .iter()
        .copied()
        .filter(|c| !exclude_ambiguous || !AMBIGUOUS.contains(c))
        .collect();

    for _ in 0..count {
        out.push(pool[rng.gen_range(0..pool.len())] as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_password_has_fixed_length_and_mixed_classes() {
        let password = user_password();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert_eq!(password.chars().filter(char::is_ascii_digit).count(), DIGIT_COUNT);
        assert_eq!(
            password
                .chars()
                .filter(|c| SYMBOLS.contains(&(*c as u8)))
                .count(),
            SYMBOL_COUNT
        );
        assert!(password.chars().any(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn rotation_password_avoids_ambiguous_characters() {
        for _ in 0..32 {
            let password = rotation_password();
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(password.chars().all(|c| !AMBIGUOUS.contains(&(c as u8))));
        }
    }

    #[test]
    fn passwords_are_not_repeated() {
        assert_ne!(user_password(), user_password());
        assert_ne!(rotation_password(), rotation_password());
    }
}
