//! Digest type and the hash functions used to build the tree

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::digest::{consts::U32, Digest, OutputSizeUser};
use std::{cmp::Ordering, fmt, ops::Deref, str::FromStr};

/// Width in bytes of every digest stored in the tree
pub const HASH_LENGTH: usize = 32;

/// A 32-byte digest: a leaf hash, an internal node or the root
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MerkleHash(pub [u8; HASH_LENGTH]);

impl MerkleHash {
    /// Lowercase hex with a `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a 32-byte hex string, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; HASH_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(MerkleHash(bytes))
    }
}

/// The primitive `H: bytes -> digest` the tree is built with.
///
/// Implemented for every 32-byte [`Digest`], so `Keccak256`, `Sha3_256` and
/// `Blake2s256` can all be plugged into the tree.
pub trait DigestProvider {
    /// Hash an arbitrary byte string
    fn hash(data: &[u8]) -> MerkleHash;

    /// Hash the concatenation `left || right`
    fn hash_concat(left: &[u8], right: &[u8]) -> MerkleHash;

    /// Hash two nodes after ordering them by byte value, so the result does
    /// not depend on which one is the left child
    fn hash_pair(a: &MerkleHash, b: &MerkleHash) -> MerkleHash {
        match a.cmp(b) {
            Ordering::Greater => Self::hash_concat(b, a),
            _ => Self::hash_concat(a, b),
        }
    }
}

impl<D> DigestProvider for D
where
    D: Digest + OutputSizeUser<OutputSize = U32>,
{
    fn hash(data: &[u8]) -> MerkleHash {
        let mut hasher = D::new();
        let mut result = [0u8; HASH_LENGTH];

        Digest::update(&mut hasher, data);
        result.copy_from_slice(hasher.finalize().as_slice());
        MerkleHash(result)
    }

    fn hash_concat(left: &[u8], right: &[u8]) -> MerkleHash {
        let mut hasher = D::new();
        let mut result = [0u8; HASH_LENGTH];

        Digest::update(&mut hasher, left);
        Digest::update(&mut hasher, right);
        result.copy_from_slice(hasher.finalize().as_slice());
        MerkleHash(result)
    }
}

impl Deref for MerkleHash {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for MerkleHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LENGTH]> for MerkleHash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        MerkleHash(bytes)
    }
}

impl PartialEq<[u8; HASH_LENGTH]> for MerkleHash {
    fn eq(&self, other: &[u8; HASH_LENGTH]) -> bool {
        &self.0 == other
    }
}

impl fmt::Debug for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleHash({})", self.to_hex())
    }
}

impl fmt::Display for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for MerkleHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for MerkleHash {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if ser.is_human_readable() {
            ser.serialize_str(&self.to_hex())
        } else {
            ser.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for MerkleHash {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if de.is_human_readable() {
            let s = String::deserialize(de)?;
            MerkleHash::from_hex(&s).map_err(de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(de)?;
            let bytes: [u8; HASH_LENGTH] = bytes
                .try_into()
                .map_err(|v: Vec<u8>| de::Error::invalid_length(v.len(), &"32 bytes"))?;
            Ok(MerkleHash(bytes))
        }
    }
}
