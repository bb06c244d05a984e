//! Day-scoped queue token numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum digit count after the `T` prefix.
const MIN_DIGITS: usize = 3;

/// A queue ticket such as `T001`.
///
/// Ordering follows the numeric sequence, so `T999 < T1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenNumber(u32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenParseError {
    #[error("token must start with 'T': {0}")]
    MissingPrefix(String),

    #[error("token sequence is not a positive number: {0}")]
    BadSequence(String),
}

impl TokenNumber {
    /// Token for the given 1-based position in the day's sequence.
    ///
    /// Returns `None` for zero; sequences start at `T001`.
    pub fn from_sequence(sequence: u32) -> Option<Self> {
        (sequence > 0).then_some(Self(sequence))
    }

    pub fn sequence(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TokenNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:0width$}", self.0, width = MIN_DIGITS)
    }
}

impl FromStr for TokenNumber {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('T')
            .ok_or_else(|| TokenParseError::MissingPrefix(s.to_string()))?;

        if digits.len() < MIN_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenParseError::BadSequence(s.to_string()));
        }

        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_sequence)
            .ok_or_else(|| TokenParseError::BadSequence(s.to_string()))
    }
}

impl TryFrom<String> for TokenNumber {
    type Error = TokenParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenNumber> for String {
    fn from(token: TokenNumber) -> Self {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_padded() {
        assert_eq!(TokenNumber::from_sequence(1).unwrap().to_string(), "T001");
        assert_eq!(TokenNumber::from_sequence(42).unwrap().to_string(), "T042");
        assert_eq!(TokenNumber::from_sequence(999).unwrap().to_string(), "T999");
    }

    #[test]
    fn test_widens_past_999() {
        assert_eq!(TokenNumber::from_sequence(1000).unwrap().to_string(), "T1000");
        assert_eq!(TokenNumber::from_sequence(12345).unwrap().to_string(), "T12345");
    }

    #[test]
    fn test_zero_is_not_a_token() {
        assert!(TokenNumber::from_sequence(0).is_none());
        assert!("T000".parse::<TokenNumber>().is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "001".parse::<TokenNumber>(),
            Err(TokenParseError::MissingPrefix(_))
        ));
        assert!("T1".parse::<TokenNumber>().is_err());
        assert!("T-01".parse::<TokenNumber>().is_err());
        assert!("T0a1".parse::<TokenNumber>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let t999: TokenNumber = "T999".parse().unwrap();
        let t1000: TokenNumber = "T1000".parse().unwrap();
        assert!(t999 < t1000);
    }

    proptest! {
        #[test]
        fn display_parses_back(sequence in 1u32..1_000_000) {
            let token = TokenNumber::from_sequence(sequence).unwrap();
            let text = token.to_string();

            prop_assert!(text.starts_with('T'));
            prop_assert!(text.len() > MIN_DIGITS);
            prop_assert_eq!(text.parse::<TokenNumber>().unwrap(), token);
        }
    }
}
