//! Persisted form of a standard Merkle tree.
//!
//! Field names follow the JSON layout produced by existing tree dumps:
//!
//! ```json
//! {
//!   "format": "standard-v1",
//!   "leafEncoding": ["address", "uint256"],
//!   "tree": ["0xceeb...", "..."],
//!   "values": [{ "value": ["0x0000000000000000000000000000000000000001", 1], "treeIndex": 8 }],
//!   "root": "0xceeb..."
//! }
//! ```

use crate::{encoding::LeafValue, hash::MerkleHash};
use serde::{Deserialize, Serialize};

/// Format tag written into every dump
pub const STANDARD_V1: &str = "standard-v1";

/// An original leaf value together with the slot its hash occupies in the node table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedValue {
    pub value: LeafValue,
    pub tree_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMerkleTreeData {
    pub format: String,
    pub leaf_encoding: Vec<String>,
    pub tree: Vec<MerkleHash>,
    /// In original insertion order
    pub values: Vec<IndexedValue>,
    /// Older dumps carry no root; it is then taken from the table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<MerkleHash>,
}
