//! Canonical CBOR helpers and stable SHA-256 hashing used to content-address
//! receipts, outcomes, and journal payloads.

use serde::Serialize;
use serde_cbor::value::Value as CborValue;
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix for serialized digests (e.g. `sha256:deadbeef...`).
pub const DIGEST_PREFIX: &str = "sha256:";

/// Serialize a value into canonical CBOR bytes using RFC 8949 deterministic
/// rules: definite lengths, map keys sorted, minimal integer widths. Two
/// replicas encoding the same record must produce identical bytes.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    // Round-tripping through `Value` sorts map keys (BTreeMap) before the
    // final encode.
    let canonical: CborValue = serde_cbor::value::to_value(value)?;
    serde_cbor::to_vec(&canonical)
}

/// Wrapper around a 32-byte SHA-256 digest used for content addressing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest32([u8; 32]);

impl Digest32 {
    /// Compute the digest of a value's canonical CBOR encoding.
    pub fn of_cbor<T: Serialize>(value: &T) -> Result<Self, serde_cbor::Error> {
        Ok(Self::of_bytes(&to_canonical_cbor(value)?))
    }

    /// Compute the digest of the provided byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&out);
        Digest32(arr)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a `sha256:...` hex string.
    pub fn to_hex(&self) -> String {
        format!("{DIGEST_PREFIX}{}", hex::encode(self.0))
    }

    /// Parse a digest from its `sha256:`-prefixed hex representation.
    pub fn from_hex_str(s: &str) -> Result<Self, DigestParseError> {
        let rest = s
            .strip_prefix(DIGEST_PREFIX)
            .ok_or(DigestParseError::MissingPrefix)?;
        if rest.len() != 64 {
            return Err(DigestParseError::InvalidLength(rest.len()));
        }
        let mut buf = [0u8; 32];
        hex::decode_to_slice(rest, &mut buf).map_err(DigestParseError::InvalidHex)?;
        Ok(Digest32(buf))
    }

    /// Attempt to build a digest from raw bytes, checking the length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DigestLengthError> {
        if bytes.len() != 32 {
            return Err(DigestLengthError(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Digest32(arr))
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest32").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for Digest32 {
    fn from(value: [u8; 32]) -> Self {
        Digest32(value)
    }
}

impl From<Digest32> for [u8; 32] {
    fn from(value: Digest32) -> Self {
        value.0
    }
}

impl AsRef<[u8; 32]> for Digest32 {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Digest32 {
    type Error = DigestLengthError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Digest32::from_bytes(value)
    }
}

impl TryFrom<&str> for Digest32 {
    type Error = DigestParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Digest32::from_hex_str(value)
    }
}

/// Error returned when a `sha256:` string is malformed.
#[derive(Debug, thiserror::Error)]
pub enum DigestParseError {
    #[error("digest string missing '{DIGEST_PREFIX}' prefix")]
    MissingPrefix,
    #[error("digest hex length must be 64, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Error returned when attempting to create a digest from the wrong byte length.
#[derive(Debug, thiserror::Error)]
#[error("digest must be 32 bytes, got {0}")]
pub struct DigestLengthError(pub usize);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn struct_fields_encode_in_sorted_key_order() {
        // Field order in the struct differs from lexicographic order; the
        // canonical encoding must sort the keys.
        #[derive(Serialize)]
        struct Unordered {
            b: u8,
            a: u8,
        }

        let bytes = to_canonical_cbor(&Unordered { b: 2, a: 1 }).unwrap();
        // map(2), "a" => 1, "b" => 2
        assert_eq!(bytes, vec![0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x02]);
    }

    #[test]
    fn canonical_encoding_is_stable() {
        let value = serde_json::json!({
            "target": "market",
            "method": "place_order",
            "order_index": 7,
        });
        let first = to_canonical_cbor(&value).unwrap();
        let second = to_canonical_cbor(&value).unwrap();
        assert_eq!(first, second);

        let decoded: serde_json::Value = serde_cbor::from_slice(&first).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn digest_matches_known_vectors() {
        assert_eq!(
            Digest32::of_bytes(b"").to_hex(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            Digest32::of_bytes(b"abc").to_hex(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parse_and_format_round_trip() {
        let original = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let digest = Digest32::from_hex_str(original).expect("parse");
        assert_eq!(digest.to_hex(), original);
        assert!(Digest32::from_hex_str("0123").is_err());
        assert!(Digest32::from_bytes(&[0u8; 31]).is_err());
    }
}
