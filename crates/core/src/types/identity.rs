//! Canonical external identifiers (ASIN / ISBN-10)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of every accepted identifier
pub const IDENTITY_LEN: usize = 10;

/// Prefixes stripped before validation, longest first
const KNOWN_PREFIXES: &[&str] = &["ASIN.", "ASIN:", "ASIN=", "ISBN.", "ISBN:", "ISBN="];

/// Why a raw string could not be turned into an [`Identity`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,

    #[error("identity '{value}' must be exactly 10 characters (got {len})")]
    InvalidLength { value: String, len: usize },

    #[error("identity '{value}' contains non-alphanumeric characters")]
    InvalidCharacters { value: String },

    #[error("ISBN-10 '{value}' has an invalid check digit")]
    InvalidCheckDigit { value: String },
}

/// Which external namespace an identity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// Amazon Standard Identification Number
    Asin,
    /// ISBN-10, used as a fallback key for print-derived releases
    Isbn10,
}

/// A normalized external identifier
///
/// Always ten ASCII characters, uppercase letters and digits only. Two
/// identities compare equal regardless of the case they were parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses and normalizes a raw identifier
    ///
    /// Accepts surrounding whitespace, any letter case and the `ASIN.` /
    /// `ISBN:` style prefixes used in folder tags.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }

        let upper = trimmed.to_ascii_uppercase();
        let body = KNOWN_PREFIXES
            .iter()
            .find_map(|prefix| upper.strip_prefix(prefix))
            .unwrap_or(upper.as_str())
            .trim();

        if !body.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdentityError::InvalidCharacters {
                value: trimmed.to_string(),
            });
        }

        if body.len() != IDENTITY_LEN {
            return Err(IdentityError::InvalidLength {
                value: trimmed.to_string(),
                len: body.chars().count(),
            });
        }

        if looks_like_isbn10(body) && !isbn10_checksum_ok(body) {
            return Err(IdentityError::InvalidCheckDigit {
                value: body.to_string(),
            });
        }

        Ok(Self(body.to_string()))
    }

    /// Returns the normalized string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the identifier
    pub fn kind(&self) -> IdentityKind {
        if looks_like_isbn10(&self.0) {
            IdentityKind::Isbn10
        } else {
            IdentityKind::Asin
        }
    }

    /// Returns the tag form used in folder names, e.g. `ASIN.B000000001`
    pub fn tag(&self) -> String {
        match self.kind() {
            IdentityKind::Asin => format!("ASIN.{}", self.0),
            IdentityKind::Isbn10 => format!("ISBN.{}", self.0),
        }
    }
}

/// Nine digits followed by a digit or `X`
fn looks_like_isbn10(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == IDENTITY_LEN
        && bytes[..9].iter().all(u8::is_ascii_digit)
        && (bytes[9].is_ascii_digit() || bytes[9] == b'X')
}

fn isbn10_checksum_ok(value: &str) -> bool {
    let sum: u32 = value
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let digit = if b == b'X' { 10 } else { u32::from(b - b'0') };
            digit * (10 - i as u32)
        })
        .sum();
    sum % 11 == 0
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asin_normalizes_case() {
        let id = Identity::parse("  b000000001 ").unwrap();
        assert_eq!(id.as_str(), "B000000001");
        assert_eq!(id.kind(), IdentityKind::Asin);
    }

    #[test]
    fn test_parse_strips_tag_prefix() {
        let id = Identity::parse("ASIN.B0ABCDEF12").unwrap();
        assert_eq!(id.as_str(), "B0ABCDEF12");
        assert_eq!(id.tag(), "ASIN.B0ABCDEF12");
    }

    #[test]
    fn test_parse_isbn10() {
        let id = Identity::parse("0306406152").unwrap();
        assert_eq!(id.kind(), IdentityKind::Isbn10);
        assert_eq!(id.tag(), "ISBN.0306406152");

        let with_x = Identity::parse("080442957x").unwrap();
        assert_eq!(with_x.as_str(), "080442957X");
    }

    #[test]
    fn test_parse_isbn10_bad_checksum() {
        let err = Identity::parse("0306406153").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCheckDigit { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(matches!(
            Identity::parse("B00000001"),
            Err(IdentityError::InvalidLength { len: 9, .. })
        ));
        assert!(matches!(
            Identity::parse("B0000000011"),
            Err(IdentityError::InvalidLength { len: 11, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_symbols() {
        assert!(matches!(
            Identity::parse("B00000-001"),
            Err(IdentityError::InvalidCharacters { .. })
        ));
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let id: Identity = serde_json::from_str("\"b000000001\"").unwrap();
        assert_eq!(id.as_str(), "B000000001");
        assert!(serde_json::from_str::<Identity>("\"nope\"").is_err());
    }
}
