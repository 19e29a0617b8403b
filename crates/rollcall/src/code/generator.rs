use super::{ALPHABET, CODE_LEN, SecurityCode};
use crate::rand::{RandSource, ThreadRandom};

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above this are rejected so every symbol is equally likely.
const ACCEPT_BELOW: u16 = (256 / ALPHABET.len() as u16) * ALPHABET.len() as u16;

#[allow(clippy::cast_possible_truncation)]
const SYMBOLS: u8 = ALPHABET.len() as u8;

/// Produces random [`SecurityCode`]s.
///
/// Each symbol is drawn independently and uniformly from [`ALPHABET`] using
/// rejection sampling over random bytes. With the default [`ThreadRandom`]
/// source the bytes come from a cryptographically secure generator, which
/// makes codes hard to guess but is not meant to make them secrets.
///
/// # Example
/// ```
/// use rollcall::{ALPHABET, SecureCodeGenerator};
///
/// let generator = SecureCodeGenerator::new();
/// let code = generator.generate();
/// assert_eq!(code.as_str().len(), 4);
/// assert!(code.as_bytes().iter().all(|b| ALPHABET.contains(b)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SecureCodeGenerator<R = ThreadRandom> {
    rng: R,
}

impl SecureCodeGenerator<ThreadRandom> {
    /// Creates a generator backed by the thread-local RNG.
    pub const fn new() -> Self {
        Self { rng: ThreadRandom }
    }
}

impl<R> SecureCodeGenerator<R>
where
    R: RandSource<u8>,
{
    /// Creates a generator backed by a custom random source.
    pub const fn with_rand(rng: R) -> Self {
        Self { rng }
    }

    /// Draws a fresh code.
    pub fn generate(&self) -> SecurityCode {
        let mut indices = [0_u8; CODE_LEN];
        for slot in &mut indices {
            *slot = self.draw_index();
        }
        SecurityCode::from_indices(indices)
    }

    fn draw_index(&self) -> u8 {
        loop {
            let byte = self.rng.rand();
            if u16::from(byte) < ACCEPT_BELOW {
                return byte % SYMBOLS;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct ScriptedRand {
        bytes: Vec<u8>,
        next: Cell<usize>,
    }

    impl ScriptedRand {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                next: Cell::new(0),
            }
        }
    }

    impl RandSource<u8> for ScriptedRand {
        fn rand(&self) -> u8 {
            let i = self.next.get();
            self.next.set(i + 1);
            self.bytes[i % self.bytes.len()]
        }
    }

    #[test]
    fn codes_are_four_alphabet_symbols() {
        let generator = SecureCodeGenerator::new();
        for _ in 0..2048 {
            let code = generator.generate();
            assert_eq!(code.as_str().len(), CODE_LEN);
            assert!(
                code.as_str()
                    .chars()
                    .all(|c| "23456789ABCDEFGHJKMNPQRSTUVWXYZ".contains(c)),
                "unexpected symbol in {code}"
            );
        }
    }

    #[test]
    fn maps_bytes_to_symbols() {
        let generator = SecureCodeGenerator::with_rand(ScriptedRand::new(&[0, 8, 30, 31]));
        assert_eq!(generator.generate().as_str(), "2AZ2");
    }

    #[test]
    fn rejects_bytes_in_the_biased_tail() {
        // 248..=255 would favour the first eight symbols; they are skipped.
        let generator =
            SecureCodeGenerator::with_rand(ScriptedRand::new(&[255, 248, 1, 249, 2, 3, 250, 4]));
        assert_eq!(generator.generate().as_str(), "3456");
    }

    #[test]
    fn accept_window_is_a_multiple_of_the_alphabet() {
        assert_eq!(ACCEPT_BELOW, 248);
        assert_eq!(ACCEPT_BELOW % ALPHABET.len() as u16, 0);
    }

    #[test]
    fn symbols_are_roughly_uniform() {
        let generator = SecureCodeGenerator::new();
        let mut counts = [0_u32; 31];
        for _ in 0..4096 {
            for &b in generator.generate().as_bytes() {
                let idx = ALPHABET.iter().position(|&a| a == b).unwrap();
                counts[idx] += 1;
            }
        }
        // 16384 draws over 31 symbols: ~528 each. Generous bounds keep this
        // from flaking.
        for (idx, &count) in counts.iter().enumerate() {
            assert!(
                (300..800).contains(&count),
                "symbol {} drawn {count} times",
                ALPHABET[idx] as char
            );
        }
    }
}
