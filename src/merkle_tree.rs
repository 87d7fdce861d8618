//! Classic Merkle tree over a leaf's link set.
//!
//! The DAG never relies on map iteration order: callers feed link values in
//! ascending numeric label order, and that ordering is part of the wire
//! contract. Blocks are hashed with SHA-256 to form the tree leaves; an odd
//! node at any level is promoted unchanged.

use crate::error::{Result, ScionicError};
use crate::types::MerkleProof;
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Root hash of the tree
    pub root: Vec<u8>,

    /// Proofs indexed by insertion position
    proofs: Vec<MerkleProof>,

    /// Mapping of keys to insertion positions
    key_to_index: HashMap<String, usize>,
}

impl MerkleTree {
    /// Build a tree from `(key, block)` pairs, in the order given.
    pub fn new(blocks: Vec<(String, Vec<u8>)>) -> Result<Self> {
        if blocks.len() < 2 {
            return Err(ScionicError::InvalidLeaf(
                "classic merkle tree requires at least two blocks".to_string(),
            ));
        }

        let mut key_to_index = HashMap::new();
        let mut leaves = Vec::with_capacity(blocks.len());

        for (i, (key, block)) in blocks.iter().enumerate() {
            leaves.push(hash_block(block));
            key_to_index.insert(key.clone(), i);
        }

        let levels = build_levels(leaves);
        let root = levels[levels.len() - 1][0].clone();

        let proofs = (0..blocks.len()).map(|i| prove(i, &levels)).collect();

        Ok(Self {
            root,
            proofs,
            key_to_index,
        })
    }

    /// Branch proof for the block inserted under `key`, with its insertion
    /// index.
    pub fn proof_for(&self, key: &str) -> Result<(usize, &MerkleProof)> {
        let index = self
            .key_to_index
            .get(key)
            .copied()
            .ok_or_else(|| ScionicError::UnknownLabel(key.to_string()))?;

        Ok((index, &self.proofs[index]))
    }

    pub fn verify(&self, block: &[u8], proof: &MerkleProof) -> Result<()> {
        verify_proof(block, proof, &self.root)
    }
}

/// Build every level of the tree bottom-up, pairing nodes left to right and
/// promoting an unpaired node unchanged.
fn build_levels(leaves: Vec<Vec<u8>>) -> Vec<Vec<Vec<u8>>> {
    let mut levels = vec![leaves];

    while levels[levels.len() - 1].len() > 1 {
        let current = &levels[levels.len() - 1];
        let next: Vec<Vec<u8>> = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [promoted] => promoted.clone(),
                _ => unreachable!(),
            })
            .collect();
        levels.push(next);
    }

    levels
}

/// Generate the branch proof for the leaf at `index`.
///
/// Bit N of `path` describes the N-th entry of `siblings`: set means the
/// sibling sits on the right of the running hash. Levels where the node is
/// promoted contribute no sibling and no bit.
fn prove(leaf_index: usize, levels: &[Vec<Vec<u8>>]) -> MerkleProof {
    let mut siblings: Vec<ByteBuf> = Vec::new();
    let mut path: u32 = 0;
    let mut index = leaf_index;

    for level in levels.iter().take(levels.len() - 1) {
        let is_right = index % 2 == 1;
        let sibling_index = if is_right { index - 1 } else { index + 1 };

        if sibling_index < level.len() {
            if !is_right {
                path |= 1 << siblings.len();
            }
            siblings.push(ByteBuf::from(level[sibling_index].clone()));
        }

        index /= 2;
    }

    MerkleProof { siblings, path }
}

/// Verify a branch proof against a tree root.
pub fn verify_proof(block: &[u8], proof: &MerkleProof, root: &[u8]) -> Result<()> {
    let mut current = hash_block(block);

    for (i, sibling) in proof.siblings.iter().enumerate() {
        let sibling_on_right = (proof.path & (1 << i)) != 0;

        current = if sibling_on_right {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
    }

    if current == root {
        Ok(())
    } else {
        Err(ScionicError::BranchInvalid {
            root: hex::encode(root),
        })
    }
}

fn hash_block(block: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(block);
    hasher.finalize().to_vec()
}

fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}
