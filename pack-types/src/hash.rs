//! Content addressing for packs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Size of a content hash in bytes.
pub const HASH_SIZE: usize = 20;

/// Length of a content hash rendered as hex.
pub const HASH_HEX_LEN: usize = HASH_SIZE * 2;

/// The content address of a pack.
///
/// SHA-1 digest of the pack bytes, displayed as 40 lowercase hex characters.
/// This is the only key accepted for retrieval.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_SIZE]);

impl ContentHash {
    /// Hash a pack's bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha1::digest(bytes);
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Parse a hex-encoded hash. Either case is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        if s.len() != HASH_HEX_LEN {
            return Err(TypesError::InvalidHash(s.to_string()));
        }
        let mut arr = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut arr).map_err(|_| TypesError::InvalidHash(s.to_string()))?;
        Ok(Self(arr))
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First two hex characters, used to fan artifacts out across directories.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..8])
    }
}

impl FromStr for ContentHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHash::of(b"pack bytes"), ContentHash::of(b"pack bytes"));
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(ContentHash::of(b"pack a"), ContentHash::of(b"pack b"));
    }

    #[test]
    fn hash_matches_known_sha1() {
        // SHA-1("abc")
        let hash = ContentHash::of(b"abc");
        assert_eq!(hash.to_string(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn empty_input_has_a_hash() {
        let hash = ContentHash::of(b"");
        assert_eq!(hash.to_string(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn parse_accepts_uppercase_and_normalises() {
        let upper = "A9993E364706816ABA3E25717850C26C9CD0D89D";
        let hash: ContentHash = upper.parse().unwrap();
        assert_eq!(hash, ContentHash::of(b"abc"));
        assert_eq!(hash.to_string(), upper.to_lowercase());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex(&"a".repeat(41)).is_err());
        assert!(ContentHash::from_hex("").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = "z".repeat(HASH_HEX_LEN);
        assert_eq!(
            ContentHash::from_hex(&bad),
            Err(TypesError::InvalidHash(bad.clone()))
        );
    }

    #[test]
    fn shard_prefix_is_first_two_hex_chars() {
        let hash = ContentHash::of(b"abc");
        assert_eq!(hash.shard_prefix(), "a9");
    }

    #[test]
    fn debug_is_truncated() {
        let hash = ContentHash::of(b"abc");
        assert_eq!(format!("{:?}", hash), "ContentHash(a9993e36)");
    }

    #[test]
    fn serde_uses_hex_string() {
        let hash = ContentHash::of(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"a9993e364706816aba3e25717850c26c9cd0d89d\"");
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
