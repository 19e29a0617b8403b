use core::{fmt, str::FromStr};

/// Symbols a security code may contain.
///
/// Digits and upper-case letters minus the glyphs that read alike on a
/// printed label: `0`/`O`, `1`/`I`/`L`.
pub const ALPHABET: &[u8; 31] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Number of symbols in a security code.
pub const CODE_LEN: usize = 4;

const NO_VALUE: u8 = 255;

/// Lookup table from ASCII byte to alphabet index, accepting lower case.
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    while (i as usize) < ALPHABET.len() {
        let c = ALPHABET[i as usize];
        lut[c as usize] = i;
        if c.is_ascii_uppercase() {
            lut[(c + 32) as usize] = i; // lowercase letter
        }
        i += 1;
    }
    lut
};

/// Returns the alphabet index of `byte`, if it is a valid symbol in either
/// case.
pub(crate) const fn symbol_index(byte: u8) -> Option<u8> {
    match LOOKUP[byte as usize] {
        NO_VALUE => None,
        idx => Some(idx),
    }
}

/// Errors produced when parsing a [`SecurityCode`] from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// The input does not have exactly [`CODE_LEN`] bytes.
    #[error("security code must be {CODE_LEN} characters, got {len}")]
    InvalidLength {
        /// Length of the rejected input in bytes.
        len: usize,
    },
    /// The input contains a byte outside [`ALPHABET`].
    #[error("invalid security code character {byte:#04x} at position {index}")]
    InvalidSymbol {
        /// The offending byte.
        byte: u8,
        /// Its position in the input.
        index: usize,
    },
}

/// A short, human-legible check-in security code.
///
/// Always exactly [`CODE_LEN`] upper-case symbols from [`ALPHABET`]. Codes are
/// only unique per issue date; see [`IssuedCode`].
///
/// # Example
/// ```
/// use rollcall::SecurityCode;
///
/// let code: SecurityCode = "k7mx".parse().unwrap();
/// assert_eq!(code.as_str(), "K7MX");
/// assert!("K0MX".parse::<SecurityCode>().is_err());
/// ```
///
/// [`IssuedCode`]: crate::IssuedCode
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct SecurityCode([u8; CODE_LEN]);

impl SecurityCode {
    /// Builds a code from alphabet indices. Indices wrap modulo the alphabet
    /// size.
    pub(crate) const fn from_indices(indices: [u8; CODE_LEN]) -> Self {
        let mut out = [0_u8; CODE_LEN];
        let mut i = 0;
        while i < CODE_LEN {
            out[i] = ALPHABET[indices[i] as usize % ALPHABET.len()];
            i += 1;
        }
        Self(out)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Every byte comes from `ALPHABET`, which is ASCII.
        core::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the raw ASCII bytes of the code.
    pub const fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }
}

impl FromStr for SecurityCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != CODE_LEN {
            return Err(CodeError::InvalidLength { len: bytes.len() });
        }
        let mut indices = [0_u8; CODE_LEN];
        for (index, (&byte, slot)) in bytes.iter().zip(indices.iter_mut()).enumerate() {
            *slot = symbol_index(byte).ok_or(CodeError::InvalidSymbol { byte, index })?;
        }
        Ok(Self::from_indices(indices))
    }
}

impl TryFrom<&str> for SecurityCode {
    type Error = CodeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for SecurityCode {
    type Error = CodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SecurityCode> for String {
    fn from(code: SecurityCode) -> Self {
        code.as_str().to_owned()
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecurityCode").field(&self.as_str()).finish()
    }
}
