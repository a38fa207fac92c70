//! Standard Merkle tree commitments over typed leaf values
//!
//! Build a tree from a set of records, publish its root, and hand out proofs
//! that let anyone holding a record check it was part of the committed set.

mod dump;
mod encoding;
mod error;
mod hash;
mod standard;
pub mod tree;

pub use crate::{
    dump::{IndexedValue, StandardMerkleTreeData, STANDARD_V1},
    encoding::{encode, leaf_hash, LeafEncoding, LeafValue},
    error::Error,
    hash::{DigestProvider, MerkleHash, HASH_LENGTH},
    standard::{StandardMerkleTree, TreeOptions},
};
pub use alloy_dyn_abi::DynSolType;
pub use blake2::Blake2s256;
pub use sha3::{Keccak256, Sha3_256};
