use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Length in characters of a canonical blob identifier.
pub const BLOB_ID_LEN: usize = 32;

/// Canonical identifier of a stored blob.
///
/// Always exactly [`BLOB_ID_LEN`] lowercase hexadecimal characters with no
/// separators. Fresh identifiers are random UUID v4 values rendered in
/// "simple" form. Because the identifier is also the chunk-key prefix, a
/// `BlobId` can only be obtained through [`BlobId::generate`] or a
/// validating parse.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobId(String);

impl BlobId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse and validate an identifier.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() != BLOB_ID_LEN || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(IdError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier bytes, as used in storage keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.short_id())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobId> for String {
    fn from(id: BlobId) -> Self {
        id.0
    }
}

impl AsRef<str> for BlobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn generated_ids_are_canonical() {
        let id = BlobId::generate();
        assert_eq!(id.as_str().len(), BLOB_ID_LEN);
        assert!(BlobId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(BlobId::generate(), BlobId::generate());
    }

    #[test]
    fn parse_accepts_lowercase_hex() {
        let id = BlobId::parse("e64a919ef57c4481bcd5fba43f8efb9c").unwrap();
        assert_eq!(id.to_string(), "e64a919ef57c4481bcd5fba43f8efb9c");
        assert_eq!(id.short_id(), "e64a919e");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(
            BlobId::parse(""),
            Err(IdError::InvalidIdentifier(String::new()))
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(BlobId::parse("e64a919ef57c4481bcd5fba43f8efb9").is_err());
        assert!(BlobId::parse("e64a919ef57c4481bcd5fba43f8efb9c0").is_err());
    }

    #[test]
    fn parse_rejects_uppercase_and_separators() {
        assert!(BlobId::parse("E64A919EF57C4481BCD5FBA43F8EFB9C").is_err());
        assert!(BlobId::parse("e64a919e-f57c-4481-bcd5-fba43f8e").is_err());
        assert!(BlobId::parse("g64a919ef57c4481bcd5fba43f8efb9c").is_err());
    }

    #[test]
    fn serde_validates_on_decode() {
        let id = BlobId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: BlobId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let bad: Result<BlobId, _> = serde_json::from_str("\"not-an-id\"");
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn parse_never_accepts_non_canonical(s in "\\PC{0,40}") {
            let canonical = s.len() == BLOB_ID_LEN
                && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            prop_assert_eq!(BlobId::parse(&s).is_ok(), canonical);
        }
    }
}
