//! Short-token codec for pathstore short links.
//!
//! Maps a non-negative integer id to a compact string over a fixed, ordered
//! alphabet (positional base-N, most significant digit first) and back. The
//! two directions are exact inverses for every id in `0..=i64::MAX`:
//!
//! ```
//! use pathstore_codec::Codec;
//!
//! let codec = Codec::default();
//! assert_eq!(codec.encode(0).unwrap(), "A");
//! let token = codec.encode(125).unwrap();
//! assert_eq!(codec.decode(&token).unwrap(), 125);
//! ```
//!
//! All arithmetic is integer arithmetic with overflow checks; there is no
//! floating-point step anywhere in the mapping.

pub mod error;

pub use error::{CodecError, CodecResult};

/// The alphabet short codes have always been drawn from: `A-Z`, `a-z`, `0-9`.
pub const BASE62_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Sentinel for "not in alphabet" in the reverse lookup table.
const NO_DIGIT: u8 = u8::MAX;

/// A base-N codec over an explicit ordered alphabet.
///
/// Digit values are alphabet positions; the first character is zero.
#[derive(Clone)]
pub struct Codec {
    symbols: Vec<u8>,
    lookup: [u8; 128],
}

impl Codec {
    /// Build a codec from an alphabet of distinct printable ASCII characters.
    ///
    /// The alphabet must contain at least two characters and no whitespace.
    pub fn new(alphabet: &str) -> CodecResult<Self> {
        let symbols: Vec<u8> = alphabet.bytes().collect();
        if symbols.len() < 2 {
            return Err(CodecError::InvalidAlphabet(
                "alphabet needs at least two characters".into(),
            ));
        }
        if symbols.len() > usize::from(NO_DIGIT) {
            return Err(CodecError::InvalidAlphabet(format!(
                "alphabet too long: {} characters",
                symbols.len()
            )));
        }

        let mut lookup = [NO_DIGIT; 128];
        for (value, &symbol) in symbols.iter().enumerate() {
            if !symbol.is_ascii_graphic() {
                return Err(CodecError::InvalidAlphabet(format!(
                    "character {:?} is not printable ASCII",
                    char::from(symbol)
                )));
            }
            let slot = &mut lookup[usize::from(symbol)];
            if *slot != NO_DIGIT {
                return Err(CodecError::InvalidAlphabet(format!(
                    "duplicate character {:?}",
                    char::from(symbol)
                )));
            }
            // value < 255 guaranteed by the length check above.
            *slot = value as u8;
        }

        Ok(Self { symbols, lookup })
    }

    /// The default base-62 codec.
    pub fn base62() -> Self {
        Self::default()
    }

    /// Number of symbols in the alphabet.
    pub fn base(&self) -> usize {
        self.symbols.len()
    }

    /// The alphabet, in digit order.
    pub fn alphabet(&self) -> &str {
        // Constructed from ASCII bytes only.
        std::str::from_utf8(&self.symbols).unwrap_or_default()
    }

    /// Encode a non-negative integer.
    ///
    /// Zero encodes to the alphabet's first character. Negative input fails
    /// with [`CodecError::InvalidInput`].
    pub fn encode(&self, n: i64) -> CodecResult<String> {
        if n < 0 {
            return Err(CodecError::InvalidInput(format!(
                "cannot encode negative integer {n}"
            )));
        }

        let base = self.symbols.len() as u64;
        let mut rest = n as u64;
        if rest == 0 {
            return Ok(char::from(self.symbols[0]).to_string());
        }

        let mut digits = Vec::new();
        while rest > 0 {
            digits.push(self.symbols[(rest % base) as usize]);
            rest /= base;
        }
        digits.reverse();

        Ok(digits.into_iter().map(char::from).collect())
    }

    /// Decode a token back into its integer.
    ///
    /// Fails with [`CodecError::InvalidCharacter`] on the first character
    /// outside the alphabet, and with [`CodecError::InvalidInput`] on empty
    /// input or a value beyond `i64::MAX`.
    pub fn decode(&self, token: &str) -> CodecResult<i64> {
        if token.is_empty() {
            return Err(CodecError::InvalidInput("cannot decode empty token".into()));
        }

        let base = self.symbols.len() as i64;
        let mut value: i64 = 0;
        for (position, ch) in token.chars().enumerate() {
            let digit = self.digit(ch).ok_or(CodecError::InvalidCharacter { ch, position })?;
            value = value
                .checked_mul(base)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or_else(|| {
                    CodecError::InvalidInput(format!("token {token:?} exceeds the integer range"))
                })?;
        }
        Ok(value)
    }

    /// Returns `true` if every character of `token` is in the alphabet.
    pub fn is_valid(&self, token: &str) -> bool {
        !token.is_empty() && token.chars().all(|ch| self.digit(ch).is_some())
    }

    fn digit(&self, ch: char) -> Option<u8> {
        if !ch.is_ascii() {
            return None;
        }
        match self.lookup[ch as usize] {
            NO_DIGIT => None,
            d => Some(d),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        let symbols: Vec<u8> = BASE62_ALPHABET.bytes().collect();
        let mut lookup = [NO_DIGIT; 128];
        for (value, &symbol) in symbols.iter().enumerate() {
            lookup[usize::from(symbol)] = value as u8;
        }
        Self { symbols, lookup }
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("base", &self.base())
            .field("alphabet", &self.alphabet())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_encodes_to_first_symbol() {
        let codec = Codec::default();
        assert_eq!(codec.encode(0).unwrap(), "A");
        assert_eq!(codec.decode("A").unwrap(), 0);
    }

    #[test]
    fn known_values() {
        let codec = Codec::default();
        assert_eq!(codec.encode(1).unwrap(), "B");
        assert_eq!(codec.encode(61).unwrap(), "9");
        assert_eq!(codec.encode(62).unwrap(), "BA");
        assert_eq!(codec.encode(62 * 62).unwrap(), "BAA");
    }

    #[test]
    fn max_value_round_trips() {
        let codec = Codec::default();
        let token = codec.encode(i64::MAX).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), i64::MAX);
    }

    #[test]
    fn beyond_double_precision_is_exact() {
        let codec = Codec::default();
        let n = (1i64 << 53) + 1;
        assert_eq!(codec.decode(&codec.encode(n).unwrap()).unwrap(), n);
    }

    #[test]
    fn negative_is_invalid_input() {
        let codec = Codec::default();
        assert!(matches!(codec.encode(-1), Err(CodecError::InvalidInput(_))));
    }

    #[test]
    fn foreign_character_rejected() {
        let codec = Codec::default();
        assert_eq!(
            codec.decode("ab-c"),
            Err(CodecError::InvalidCharacter { ch: '-', position: 2 })
        );
        assert!(matches!(
            codec.decode("é"),
            Err(CodecError::InvalidCharacter { ch: 'é', position: 0 })
        ));
    }

    #[test]
    fn empty_token_rejected() {
        assert!(matches!(Codec::default().decode(""), Err(CodecError::InvalidInput(_))));
    }

    #[test]
    fn overflow_rejected() {
        let codec = Codec::default();
        let too_big = format!("{}A", codec.encode(i64::MAX).unwrap());
        assert!(matches!(codec.decode(&too_big), Err(CodecError::InvalidInput(_))));
    }

    #[test]
    fn custom_alphabet() {
        let codec = Codec::new("01").unwrap();
        assert_eq!(codec.base(), 2);
        assert_eq!(codec.encode(5).unwrap(), "101");
        assert_eq!(codec.decode("101").unwrap(), 5);
        assert!(!codec.is_valid("102"));
    }

    #[test]
    fn bad_alphabets() {
        assert!(matches!(Codec::new("a"), Err(CodecError::InvalidAlphabet(_))));
        assert!(matches!(Codec::new("abca"), Err(CodecError::InvalidAlphabet(_))));
        assert!(matches!(Codec::new("ab c"), Err(CodecError::InvalidAlphabet(_))));
    }

    #[test]
    fn default_matches_explicit_alphabet() {
        let explicit = Codec::new(BASE62_ALPHABET).unwrap();
        let default = Codec::base62();
        assert_eq!(explicit.alphabet(), default.alphabet());
        assert_eq!(explicit.encode(987_654_321).unwrap(), default.encode(987_654_321).unwrap());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(n in 0i64..=i64::MAX) {
            let codec = Codec::default();
            let token = codec.encode(n).unwrap();
            prop_assert_eq!(codec.decode(&token).unwrap(), n);
        }

        #[test]
        fn output_stays_in_alphabet(n in 0i64..=i64::MAX) {
            let codec = Codec::default();
            let token = codec.encode(n).unwrap();
            prop_assert!(token.bytes().all(|b| BASE62_ALPHABET.as_bytes().contains(&b)));
        }

        #[test]
        fn length_is_monotonic(a in 0i64..1_000_000_000, b in 0i64..1_000_000_000) {
            let codec = Codec::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(codec.encode(lo).unwrap().len() <= codec.encode(hi).unwrap().len());
        }

        #[test]
        fn small_alphabet_round_trips(n in 0i64..100_000) {
            let codec = Codec::new("xyz").unwrap();
            prop_assert_eq!(codec.decode(&codec.encode(n).unwrap()).unwrap(), n);
        }
    }
}
