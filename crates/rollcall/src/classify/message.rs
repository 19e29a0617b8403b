use core::fmt::{self, Write};

use super::ConflictClassifier;

/// Phrasings drivers use for unique-constraint failures. Lower case.
const PHRASES: [&str; 3] = ["duplicate key", "unique constraint", "unique violation"];

/// Longest message prefix inspected. Driver messages put the reason first.
const MAX_SCAN: usize = 1024;

/// Message-only classifier for backends that expose no structured codes.
///
/// Performs a case-insensitive substring match of the error's `Display` text
/// against a short list of known phrasings. Anything else is "not a
/// conflict".
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageClassifier;

impl<E> ConflictClassifier<E> for MessageClassifier
where
    E: fmt::Display + ?Sized,
{
    fn is_uniqueness_violation(err: &E) -> bool {
        mentions_uniqueness(err)
    }
}

pub(super) fn mentions_uniqueness<E: fmt::Display + ?Sized>(err: &E) -> bool {
    let mut buf = LowercaseBuf::default();
    // Truncation is reported as an error; the prefix is still usable.
    let _ = write!(buf, "{err}");
    PHRASES.iter().any(|phrase| buf.text.contains(phrase))
}

#[derive(Default)]
struct LowercaseBuf {
    text: String,
}

impl Write for LowercaseBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.text.len() >= MAX_SCAN {
                return Err(fmt::Error);
            }
            self.text.push(c.to_ascii_lowercase());
        }
        Ok(())
    }
}
