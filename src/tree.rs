//! Array-backed Merkle tree: construction, proofs and index arithmetic.
//!
//! The tree is a flat table of `2n - 1` digests. Node `i` has its children at
//! `2i + 1` and `2i + 2`, the root sits at index 0 and the `n` leaves fill
//! the last `n` slots, so every relation between nodes is plain arithmetic.

use crate::{
    error::Error,
    hash::{DigestProvider, MerkleHash},
};
use log::trace;

const LOG_TARGET: &str = "standard_merkle_tree::tree";

/// Get a node's depth and offset given its index
pub fn get_depth_and_offset(index: usize) -> (usize, usize) {
    let mut depth = 0usize;
    let index = index + 1;
    while (index >> depth) > 1 {
        depth += 1;
    }
    (depth, index - (1 << depth))
}

/// Get a node's parent index given its own index
pub fn get_parent_index(node_index: usize) -> usize {
    node_index.saturating_sub(1) >> 1
}

/// Get a node's child indices given its own index
pub fn child_indices(node_index: usize) -> (usize, usize) {
    ((node_index << 1) + 1, (node_index << 1) + 2)
}

/// Get the index of the node sharing a parent with this one. The root has none.
pub fn get_sibling_index(node_index: usize) -> Option<usize> {
    match node_index {
        0 => None,
        i if i & 1 == 1 => Some(i + 1),
        i => Some(i - 1),
    }
}

pub fn is_tree_node(tree: &[MerkleHash], index: usize) -> bool {
    index < tree.len()
}

pub fn is_internal_node(tree: &[MerkleHash], index: usize) -> bool {
    is_tree_node(tree, child_indices(index).0)
}

pub fn is_leaf_node(tree: &[MerkleHash], index: usize) -> bool {
    is_tree_node(tree, index) && !is_internal_node(tree, index)
}

/// Build the node table for leaves given in their final order.
///
/// Leaf `k` is stored at index `len - 1 - k`; internal nodes are filled from
/// the deepest one up to the root so every level is complete before its
/// parents are hashed.
pub fn make_merkle_tree<HF: DigestProvider>(
    leaves: &[MerkleHash],
) -> Result<Vec<MerkleHash>, Error> {
    if leaves.is_empty() {
        return Err(Error::EmptyTree);
    }
    let len = 2 * leaves.len() - 1;
    let mut tree = vec![MerkleHash::default(); len];
    for (k, leaf) in leaves.iter().enumerate() {
        tree[len - 1 - k] = *leaf;
    }
    for i in (0..len - leaves.len()).rev() {
        let (left, right) = child_indices(i);
        tree[i] = HF::hash_pair(&tree[left], &tree[right]);
    }
    Ok(tree)
}

/// Collect the sibling digests from the leaf at `index` up to the root
pub fn get_proof(tree: &[MerkleHash], index: usize) -> Result<Vec<MerkleHash>, Error> {
    if !is_leaf_node(tree, index) {
        return Err(Error::NotALeaf(index));
    }
    let (depth, _) = get_depth_and_offset(index);
    let mut proof = Vec::with_capacity(depth);
    let mut working_index = index;
    while let Some(sibling_index) = get_sibling_index(working_index) {
        let sibling = tree.get(sibling_index).ok_or_else(|| {
            Error::CorruptTree(format!("node {} has no sibling", working_index))
        })?;
        proof.push(*sibling);
        working_index = get_parent_index(working_index);
    }
    trace!(
        target: LOG_TARGET,
        "Proof for node {} has {} elements",
        index,
        proof.len()
    );
    Ok(proof)
}

/// Compute the root implied by a leaf and its proof
pub fn process_proof<HF: DigestProvider>(leaf: &MerkleHash, proof: &[MerkleHash]) -> MerkleHash {
    proof
        .iter()
        .fold(*leaf, |node, sibling| HF::hash_pair(&node, sibling))
}

/// Check a leaf digest and proof against a root. Needs nothing but the three
/// inputs; any proof that does not lead to `root` is simply rejected.
#[must_use = "Must use the result of the proof verification"]
pub fn verify_leaf_hash<HF: DigestProvider>(
    root: &MerkleHash,
    leaf: &MerkleHash,
    proof: &[MerkleHash],
) -> bool {
    process_proof::<HF>(leaf, proof) == *root
}

/// Check that every internal node is the hash of its two children
pub fn is_valid_merkle_tree<HF: DigestProvider>(tree: &[MerkleHash]) -> Result<(), Error> {
    if tree.is_empty() {
        return Err(Error::EmptyTree);
    }
    if tree.len() % 2 == 0 {
        return Err(Error::CorruptTree(format!(
            "node table has even length {}",
            tree.len()
        )));
    }
    for (i, node) in tree.iter().enumerate() {
        if !is_internal_node(tree, i) {
            continue;
        }
        let (left, right) = child_indices(i);
        if *node != HF::hash_pair(&tree[left], &tree[right]) {
            return Err(Error::CorruptTree(format!(
                "node {} is not the hash of nodes {} and {}",
                i, left, right
            )));
        }
    }
    Ok(())
}

/// Draw the node table as an indented tree, one `index) digest` per line
pub fn render_merkle_tree(tree: &[MerkleHash]) -> Result<String, Error> {
    if tree.is_empty() {
        return Err(Error::EmptyTree);
    }
    let mut stack = vec![(0usize, Vec::<bool>::new())];
    let mut lines = Vec::with_capacity(tree.len());

    while let Some((i, path)) = stack.pop() {
        let mut line = String::new();
        if let Some((last, parents)) = path.split_last() {
            for has_more in parents {
                line.push_str(if *has_more { "│  " } else { "   " });
            }
            line.push_str(if *last { "├─ " } else { "└─ " });
        }
        line.push_str(&format!("{}) {}", i, tree[i]));
        lines.push(line);

        if is_internal_node(tree, i) {
            let (left, right) = child_indices(i);
            let mut right_path = path.clone();
            right_path.push(false);
            let mut left_path = path;
            left_path.push(true);
            stack.push((right, right_path));
            stack.push((left, left_path));
        }
    }
    Ok(lines.join("\n"))
}
