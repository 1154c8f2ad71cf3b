//! SHA-256 hashing
//!
//! Every "hash" in the ledger is a double SHA-256 digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte hash output
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Create a zero hash (genesis previous hash, coinbase input reference)
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Create hash from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Create hash from hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Binary string form, 4 characters per hex digit
    pub fn to_binary_string(&self) -> String {
        self.0.iter().map(|byte| format!("{:08b}", byte)).collect()
    }

    /// Number of leading zero bits
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Hash::from_hex(&hex)
            .map_err(|_| serde::de::Error::custom("expected a 64-character hex hash"))
    }
}

/// Single SHA-256
pub fn sha256(data: &[u8]) -> Hash {
    Hash(Sha256::digest(data).into())
}

/// Double SHA-256, used for every ledger hash
pub fn double_hash(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    Hash(Sha256::digest(first).into())
}

/// Hash two hashes together (for Merkle tree)
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&left.0);
    data.extend_from_slice(&right.0);
    double_hash(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_hash_known_vector() {
        // sha256d("hello")
        let hash = double_hash(b"hello");
        assert_eq!(
            hash.to_hex(),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(double_hash(b"hello"), double_hash(b"world"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = double_hash(b"test");
        let recovered: Hash = hash.to_hex().parse().unwrap();
        assert_eq!(hash, recovered);
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_leading_zero_bits() {
        let mut bytes = [0xffu8; 32];
        assert_eq!(Hash(bytes).leading_zero_bits(), 0);
        bytes[0] = 0x00;
        bytes[1] = 0x1f;
        assert_eq!(Hash(bytes).leading_zero_bits(), 11);
        assert_eq!(Hash::zero().leading_zero_bits(), 256);
    }

    #[test]
    fn test_binary_string_matches_leading_zeros() {
        let hash = double_hash(b"binary");
        let binary = hash.to_binary_string();
        assert_eq!(binary.len(), 256);
        let zeros = binary.chars().take_while(|c| *c == '0').count() as u32;
        assert_eq!(zeros, hash.leading_zero_bits());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = double_hash(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<Hash>("\"00ff\"").is_err());
    }

    #[test]
    fn test_hash_pair_over_raw_digests() {
        let (left, right) = (double_hash(b"left"), double_hash(b"right"));
        let mut bytes = left.0.to_vec();
        bytes.extend_from_slice(&right.0);
        assert_eq!(hash_pair(&left, &right), double_hash(&bytes));

        let hex = format!("{}{}", left.to_hex(), right.to_hex());
        assert_ne!(hash_pair(&left, &right), double_hash(hex.as_bytes()));
    }

    #[test]
    fn test_hash_pair_order_matters() {
        let left = double_hash(b"left");
        let right = double_hash(b"right");
        assert_ne!(hash_pair(&left, &right), hash_pair(&right, &left));
    }
}
