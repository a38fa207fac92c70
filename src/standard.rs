//! Standard Merkle tree over ABI-encoded leaf values

use crate::{
    dump::{IndexedValue, StandardMerkleTreeData, STANDARD_V1},
    encoding::{leaf_hash, LeafEncoding, LeafValue},
    error::Error,
    hash::{DigestProvider, MerkleHash},
    tree::{
        get_proof, is_leaf_node, is_valid_merkle_tree, make_merkle_tree, render_merkle_tree,
        verify_leaf_hash,
    },
};
use log::{debug, warn};
use sha3::Keccak256;
use std::{collections::HashMap, fmt, marker::PhantomData};

const LOG_TARGET: &str = "standard_merkle_tree::standard";

/// Options applied when building a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Sort leaf hashes before building, making the root independent of the
    /// order values were supplied in. Turning this off keeps insertion order
    /// and only exists to reproduce trees that were built that way.
    pub sort_leaves: bool,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort_leaves(mut self, sort_leaves: bool) -> Self {
        self.sort_leaves = sort_leaves;
        self
    }
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self { sort_leaves: true }
    }
}

/// Merkle tree committing to a set of typed values.
///
/// Leaves are `H(H(abi_encode(value)))`, internal nodes hash their two
/// children in byte order, and the node table is stored flat. A built tree
/// is never mutated, so it can be shared between threads freely.
pub struct StandardMerkleTree<HF: DigestProvider = Keccak256> {
    _hasher: PhantomData<fn() -> HF>,
    tree: Vec<MerkleHash>,
    values: Vec<IndexedValue>,
    leaf_encoding: LeafEncoding,
    /// Leaf hash to original value index
    hash_lookup: HashMap<MerkleHash, usize>,
}

impl<HF: DigestProvider> StandardMerkleTree<HF> {
    /// Build a tree from values in insertion order, sorting the leaves
    pub fn of<I>(values: I, leaf_encoding: &LeafEncoding) -> Result<Self, Error>
    where
        I: IntoIterator<Item = LeafValue>,
    {
        Self::of_with_options(values, leaf_encoding, TreeOptions::default())
    }

    pub fn of_with_options<I>(
        values: I,
        leaf_encoding: &LeafEncoding,
        options: TreeOptions,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = LeafValue>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        if values.is_empty() {
            return Err(Error::EmptyTree);
        }

        let mut hashed_values = values
            .iter()
            .enumerate()
            .map(|(i, value)| leaf_hash::<HF>(value, leaf_encoding).map(|hash| (hash, i)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut hash_lookup = HashMap::with_capacity(hashed_values.len());
        for (hash, i) in &hashed_values {
            if let Some(first) = hash_lookup.insert(*hash, *i) {
                return Err(Error::DuplicateLeaf(first, *i));
            }
        }

        if options.sort_leaves {
            hashed_values.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        }
        let leaves = hashed_values.iter().map(|(hash, _)| *hash).collect::<Vec<_>>();
        let tree = make_merkle_tree::<HF>(&leaves)?;

        let mut tree_indices = vec![0usize; values.len()];
        for (k, (_, i)) in hashed_values.iter().enumerate() {
            tree_indices[*i] = tree.len() - 1 - k;
        }
        let values = values
            .into_iter()
            .zip(tree_indices)
            .map(|(value, tree_index)| IndexedValue { value, tree_index })
            .collect::<Vec<_>>();

        debug!(
            target: LOG_TARGET,
            "Built tree with {} leaves, root {}",
            values.len(),
            tree[0]
        );
        Ok(Self {
            _hasher: PhantomData,
            tree,
            values,
            leaf_encoding: leaf_encoding.clone(),
            hash_lookup,
        })
    }

    /// Restore a tree from its persisted form. The table is taken as is, but
    /// every value and node is checked against it before the tree is returned.
    pub fn load(data: StandardMerkleTreeData) -> Result<Self, Error> {
        Self::from_data(data).map_err(|e| {
            warn!(target: LOG_TARGET, "Rejected tree dump: {}", e);
            e
        })
    }

    fn from_data(data: StandardMerkleTreeData) -> Result<Self, Error> {
        if data.format != STANDARD_V1 {
            return Err(Error::UnknownFormat(data.format));
        }
        let leaf_encoding = LeafEncoding::parse(&data.leaf_encoding)
            .map_err(|e| Error::SchemaMismatch(e.to_string()))?;
        if data.values.is_empty() {
            return Err(Error::EmptyTree);
        }

        let hashes = data
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                leaf_hash::<HF>(&v.value, &leaf_encoding)
                    .map_err(|e| Error::SchemaMismatch(format!("value {}: {}", i, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tree = data.tree;
        if tree.len() != 2 * data.values.len() - 1 {
            return Err(Error::CorruptTree(format!(
                "{} nodes cannot hold {} leaves",
                tree.len(),
                data.values.len()
            )));
        }
        let mut hash_lookup = HashMap::with_capacity(hashes.len());
        for (i, (value, hash)) in data.values.iter().zip(&hashes).enumerate() {
            check_leaf(&tree, i, value.tree_index, hash)?;
            if let Some(first) = hash_lookup.insert(*hash, i) {
                return Err(Error::CorruptTree(format!(
                    "values {} and {} share the same leaf",
                    first, i
                )));
            }
        }
        is_valid_merkle_tree::<HF>(&tree)?;
        if let Some(root) = data.root {
            if root != tree[0] {
                return Err(Error::CorruptTree(format!(
                    "stored root {} does not match computed root {}",
                    root, tree[0]
                )));
            }
        }

        debug!(
            target: LOG_TARGET,
            "Loaded tree with {} leaves, root {}",
            data.values.len(),
            tree[0]
        );
        Ok(Self {
            _hasher: PhantomData,
            tree,
            values: data.values,
            leaf_encoding,
            hash_lookup,
        })
    }

    /// Export the tree, including its root, for persistence
    pub fn dump(&self) -> StandardMerkleTreeData {
        StandardMerkleTreeData {
            format: STANDARD_V1.to_string(),
            leaf_encoding: self.leaf_encoding.to_strings(),
            tree: self.tree.clone(),
            values: self.values.clone(),
            root: Some(*self.root()),
        }
    }

    /// Re-hash every value and every internal node against the table
    pub fn validate(&self) -> Result<(), Error> {
        for (i, value) in self.values.iter().enumerate() {
            let hash = self.leaf_hash(&value.value)?;
            check_leaf(&self.tree, i, value.tree_index, &hash)?;
        }
        is_valid_merkle_tree::<HF>(&self.tree)
    }

    /// Get the merkle root of the tree
    pub fn root(&self) -> &MerkleHash {
        &self.tree[0]
    }

    pub fn leaf_encoding(&self) -> &LeafEncoding {
        &self.leaf_encoding
    }

    /// Get the number of leaves in the tree
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// A built tree always holds at least one leaf
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at an original insertion index
    pub fn at(&self, index: usize) -> Option<&LeafValue> {
        self.values.get(index).map(|v| &v.value)
    }

    /// Values paired with their insertion index, in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (usize, &LeafValue)> + '_ {
        self.values.iter().map(|v| &v.value).enumerate()
    }

    pub fn leaf_hash(&self, value: &[serde_json::Value]) -> Result<MerkleHash, Error> {
        leaf_hash::<HF>(value, &self.leaf_encoding)
    }

    /// Find the insertion index of a value
    pub fn leaf_lookup(&self, value: &[serde_json::Value]) -> Result<usize, Error> {
        let hash = self.leaf_hash(value)?;
        self.hash_lookup
            .get(&hash)
            .copied()
            .ok_or(Error::LeafNotInTree)
    }

    /// Proof for the value at an original insertion index
    pub fn get_proof(&self, index: usize) -> Result<Vec<MerkleHash>, Error> {
        let value = self
            .values
            .get(index)
            .ok_or(Error::IndexOutOfRange(index, self.values.len()))?;
        get_proof(&self.tree, value.tree_index)
    }

    pub fn get_proof_for_value(
        &self,
        value: &[serde_json::Value],
    ) -> Result<Vec<MerkleHash>, Error> {
        self.get_proof(self.leaf_lookup(value)?)
    }

    /// Check a proof for the value at `index` against this tree's root
    pub fn verify(&self, index: usize, proof: &[MerkleHash]) -> Result<bool, Error> {
        let value = self
            .values
            .get(index)
            .ok_or(Error::IndexOutOfRange(index, self.values.len()))?;
        Ok(verify_leaf_hash::<HF>(
            self.root(),
            &self.tree[value.tree_index],
            proof,
        ))
    }

    /// Check a proof for any value against this tree's root
    pub fn verify_value(
        &self,
        value: &[serde_json::Value],
        proof: &[MerkleHash],
    ) -> Result<bool, Error> {
        Self::verify_with(self.root(), &self.leaf_encoding, value, proof)
    }

    /// Like [`verify`](Self::verify), but a proof that does not lead to the
    /// root is an [`Error::VerificationFailure`]
    pub fn verify_strict(&self, index: usize, proof: &[MerkleHash]) -> Result<(), Error> {
        if self.verify(index, proof)? {
            Ok(())
        } else {
            Err(Error::VerificationFailure)
        }
    }

    /// Verify a value against a root without holding the tree.
    ///
    /// Only a value that cannot be encoded is an error; a forged or stale
    /// proof returns `Ok(false)`.
    pub fn verify_with(
        root: &MerkleHash,
        leaf_encoding: &LeafEncoding,
        value: &[serde_json::Value],
        proof: &[MerkleHash],
    ) -> Result<bool, Error> {
        let leaf = leaf_hash::<HF>(value, leaf_encoding)?;
        Ok(verify_leaf_hash::<HF>(root, &leaf, proof))
    }

    /// Draw the node table, see [`render_merkle_tree`]
    pub fn render(&self) -> String {
        render_merkle_tree(&self.tree).unwrap_or_default()
    }
}

fn check_leaf(
    tree: &[MerkleHash],
    value_index: usize,
    tree_index: usize,
    hash: &MerkleHash,
) -> Result<(), Error> {
    if !is_leaf_node(tree, tree_index) {
        return Err(Error::CorruptTree(format!(
            "value {} points at node {} which is not a leaf",
            value_index, tree_index
        )));
    }
    if tree[tree_index] != *hash {
        return Err(Error::CorruptTree(format!(
            "value {} does not match leaf {}",
            value_index, tree_index
        )));
    }
    Ok(())
}

impl<HF: DigestProvider> Clone for StandardMerkleTree<HF> {
    fn clone(&self) -> Self {
        Self {
            _hasher: PhantomData,
            tree: self.tree.clone(),
            values: self.values.clone(),
            leaf_encoding: self.leaf_encoding.clone(),
            hash_lookup: self.hash_lookup.clone(),
        }
    }
}

impl<HF: DigestProvider> fmt::Debug for StandardMerkleTree<HF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardMerkleTree")
            .field("root", self.root())
            .field("leaf_encoding", &self.leaf_encoding)
            .field("len", &self.values.len())
            .finish()
    }
}
