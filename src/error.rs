//! Merkle Tree Errors

use displaydoc::Display;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Error {
    /// Cannot encode field {field} as {ty}: {reason}
    Encoding {
        field: usize,
        ty: String,
        reason: String,
    },
    /// Values at index {0} and {1} produce the same leaf hash
    DuplicateLeaf(usize, usize),
    /// Expected at least one leaf
    EmptyTree,
    /// Requested index: {0} exceeds number of leaves: {1}
    IndexOutOfRange(usize, usize),
    /// Index {0} is not a leaf of the tree
    NotALeaf(usize),
    /// Leaf is not in tree
    LeafNotInTree,
    /// Merkle tree is corrupt: {0}
    CorruptTree(String),
    /// Values do not match the leaf encoding: {0}
    SchemaMismatch(String),
    /// Unknown tree format: {0}
    UnknownFormat(String),
    /// Proof does not lead to the expected root
    VerificationFailure,
}

impl std::error::Error for Error {}
