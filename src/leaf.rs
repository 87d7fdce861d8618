//! Leaf construction, hashing and verification.
//!
//! A leaf's identifier is derived from its canonical preimage: a CBOR map of
//! the hash-critical fields, in a fixed order, with `AdditionalData` keys
//! ascending. The body (`Content`) is never part of the preimage; only
//! `ContentHash` is, so a peer can verify the shape of a leaf without its
//! bytes. Two implementations interoperate iff their preimages are
//! byte-identical for the same logical leaf.

use crate::dag::DagBuilder;
use crate::error::{Result, ScionicError};
use crate::identifier::{self, IdentifierEncoding};
use crate::merkle_tree::{self, MerkleTree};
use crate::types::{ClassicTreeBranch, DagLeaf, DagLeafBuilder, LeafType};
use serde::Serialize;
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Canonicalise additional data for the preimage: absent and empty collapse
/// to the same empty map, keys serialize ascending.
fn sort_additional_data(map: &Option<HashMap<String, String>>) -> BTreeMap<String, String> {
    match map {
        None => BTreeMap::new(),
        Some(m) => m.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}

/// Link values in ascending numeric label order. Every consumer that needs
/// a deterministic child order goes through this.
pub(crate) fn links_in_label_order(
    links: &HashMap<String, String>,
) -> Result<Vec<(&String, &String)>> {
    let mut entries: Vec<(u64, (&String, &String))> = Vec::with_capacity(links.len());

    for (label, value) in links {
        entries.push((identifier::parse_label(label)?, (label, value)));
    }

    entries.sort_by_key(|(n, _)| *n);

    Ok(entries.into_iter().map(|(_, pair)| pair).collect())
}

/// Classic Merkle tree over a link set, fed in label order.
pub(crate) fn build_link_tree(links: &HashMap<String, String>) -> Result<MerkleTree> {
    let blocks = links_in_label_order(links)?
        .into_iter()
        .map(|(label, value)| (label.clone(), value.as_bytes().to_vec()))
        .collect();

    MerkleTree::new(blocks)
}

/// Classic Merkle root for a link set; empty for fewer than two links.
fn classic_root(links: &HashMap<String, String>) -> Result<Option<Vec<u8>>> {
    if links.len() < 2 {
        return Ok(None);
    }

    Ok(Some(build_link_tree(links)?.root))
}

fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

#[derive(Serialize)]
struct LeafData {
    #[serde(rename = "ItemName")]
    item_name: String,
    #[serde(rename = "Type")]
    leaf_type: String,
    #[serde(rename = "MerkleRoot")]
    merkle_root: ByteBuf,
    #[serde(rename = "CurrentLinkCount")]
    current_link_count: usize,
    #[serde(rename = "ContentHash")]
    content_hash: Option<ByteBuf>,
    #[serde(rename = "AdditionalData")]
    additional_data: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct RootLeafData {
    #[serde(rename = "ItemName")]
    item_name: String,
    #[serde(rename = "Type")]
    leaf_type: String,
    #[serde(rename = "MerkleRoot")]
    merkle_root: ByteBuf,
    #[serde(rename = "CurrentLinkCount")]
    current_link_count: usize,
    #[serde(rename = "LatestLabel")]
    latest_label: String,
    #[serde(rename = "LeafCount")]
    leaf_count: usize,
    #[serde(rename = "ContentHash")]
    content_hash: Option<ByteBuf>,
    #[serde(rename = "AdditionalData")]
    additional_data: BTreeMap<String, String>,
}

fn preimage_digest<T: Serialize>(preimage: &T) -> Result<Vec<u8>> {
    let serialized =
        serde_cbor::to_vec(preimage).map_err(|e| ScionicError::Serialization(e.to_string()))?;

    Ok(sha256(&serialized))
}

fn leaf_digest(
    item_name: &str,
    leaf_type: &LeafType,
    merkle_root: &Option<Vec<u8>>,
    current_link_count: usize,
    root_fields: Option<(&str, usize)>,
    content_hash: &Option<Vec<u8>>,
    additional_data: &Option<HashMap<String, String>>,
) -> Result<Vec<u8>> {
    let merkle_root = ByteBuf::from(merkle_root.clone().unwrap_or_default());
    let content_hash = content_hash.clone().map(ByteBuf::from);
    let additional_data = sort_additional_data(additional_data);

    match root_fields {
        None => preimage_digest(&LeafData {
            item_name: item_name.to_string(),
            leaf_type: leaf_type.to_string(),
            merkle_root,
            current_link_count,
            content_hash,
            additional_data,
        }),
        Some((latest_label, leaf_count)) => preimage_digest(&RootLeafData {
            item_name: item_name.to_string(),
            leaf_type: leaf_type.to_string(),
            merkle_root,
            current_link_count,
            latest_label: latest_label.to_string(),
            leaf_count,
            content_hash,
            additional_data,
        }),
    }
}

impl DagLeafBuilder {
    /// Build a regular (non-root) leaf
    pub fn build_leaf(
        self,
        encoding: IdentifierEncoding,
        additional_data: Option<HashMap<String, String>>,
    ) -> Result<DagLeaf> {
        let leaf_type = self.leaf_type.ok_or(ScionicError::MissingLeafType)?;

        let merkle_root = classic_root(&self.links)?;
        let content_hash = self.data.as_ref().map(|data| sha256(data));

        let digest = leaf_digest(
            &self.item_name,
            &leaf_type,
            &merkle_root,
            self.links.len(),
            None,
            &content_hash,
            &additional_data,
        )?;

        Ok(DagLeaf {
            hash: encoding.encode_digest(&digest)?,
            item_name: self.item_name,
            leaf_type,
            content_hash,
            content: self.data,
            classic_merkle_root: merkle_root,
            current_link_count: self.links.len(),
            latest_label: None,
            leaf_count: None,
            links: self.links,
            parent_hash: None,
            additional_data,
            proofs: None,
        })
    }

    /// Build the root leaf. Reads the highest allocated label and the leaf
    /// count from the DAG builder and seals both into the preimage; the
    /// count includes the root itself.
    pub fn build_root_leaf(
        self,
        dag: &DagBuilder,
        encoding: IdentifierEncoding,
        additional_data: Option<HashMap<String, String>>,
    ) -> Result<DagLeaf> {
        let leaf_type = self.leaf_type.ok_or(ScionicError::MissingLeafType)?;

        let merkle_root = classic_root(&self.links)?;
        let content_hash = self.data.as_ref().map(|data| sha256(data));

        let latest_label = dag.latest_label();
        let leaf_count = dag.leaves.len() + 1;

        let digest = leaf_digest(
            &self.item_name,
            &leaf_type,
            &merkle_root,
            self.links.len(),
            Some((&latest_label, leaf_count)),
            &content_hash,
            &additional_data,
        )?;

        Ok(DagLeaf {
            hash: encoding.encode_digest(&digest)?,
            item_name: self.item_name,
            leaf_type,
            content_hash,
            content: self.data,
            classic_merkle_root: merkle_root,
            current_link_count: self.links.len(),
            latest_label: Some(latest_label),
            leaf_count: Some(leaf_count),
            links: self.links,
            parent_hash: None,
            additional_data,
            proofs: None,
        })
    }
}

impl DagLeaf {
    /// Verify a regular (non-root) leaf against its stored identifier.
    ///
    /// The comparison is on digest bytes, so it holds for identifiers in
    /// either encoding (CID or raw multibase).
    pub fn verify_leaf(&self) -> Result<()> {
        let computed = leaf_digest(
            &self.item_name,
            &self.leaf_type,
            &self.classic_merkle_root,
            self.current_link_count,
            None,
            &self.content_hash,
            &self.additional_data,
        )?;

        let stored = identifier::decode_digest(identifier::hash_of(&self.hash))?;

        if computed != stored {
            return Err(ScionicError::HashMismatch {
                identifier: self.hash.clone(),
                computed: hex::encode(computed),
            });
        }

        Ok(())
    }

    /// Verify the root leaf, whose preimage additionally seals
    /// `LatestLabel` and `LeafCount`.
    pub fn verify_root_leaf(&self) -> Result<()> {
        let computed = leaf_digest(
            &self.item_name,
            &self.leaf_type,
            &self.classic_merkle_root,
            self.current_link_count,
            Some((
                self.latest_label.as_deref().unwrap_or_default(),
                self.leaf_count.unwrap_or(0),
            )),
            &self.content_hash,
            &self.additional_data,
        )?;

        let stored = identifier::decode_digest(identifier::hash_of(&self.hash))?;

        if computed != stored {
            return Err(ScionicError::RootHashMismatch {
                identifier: self.hash.clone(),
                computed: hex::encode(computed),
            });
        }

        Ok(())
    }

    /// Whether this leaf links to `hash`.
    ///
    /// Either side may carry a label. When both do, the full identifiers
    /// must match; when either lacks one, equality is on the hash portion
    /// alone.
    pub fn has_link(&self, hash: &str) -> bool {
        self.links.values().any(|link| {
            match (identifier::has_label(hash), identifier::has_label(link)) {
                (true, true) => link == hash,
                (true, false) => link == identifier::hash_of(hash),
                (false, true) => identifier::hash_of(link) == hash,
                (false, false) => identifier::hash_of(link) == identifier::hash_of(hash),
            }
        })
    }

    /// Child link values in ascending numeric label order.
    pub fn sorted_links(&self) -> Result<Vec<(&String, &String)>> {
        links_in_label_order(&self.links)
    }

    /// Classic Merkle branch for the child stored under `label`.
    ///
    /// `None` when the leaf has fewer than two links (no classic tree
    /// exists; the child is certified by the preimage alone).
    pub fn get_branch(&self, label: &str) -> Result<Option<ClassicTreeBranch>> {
        if self.links.len() < 2 {
            return Ok(None);
        }

        let link = self
            .links
            .get(label)
            .ok_or_else(|| ScionicError::UnknownLabel(label.to_string()))?;

        let tree = build_link_tree(&self.links)?;
        let (_, proof) = tree.proof_for(label)?;

        Ok(Some(ClassicTreeBranch {
            leaf: link.clone(),
            proof: proof.clone(),
        }))
    }

    /// Verify a branch against this leaf's classic Merkle root.
    pub fn verify_branch(&self, branch: &ClassicTreeBranch) -> Result<()> {
        let root = self.classic_merkle_root.as_deref().ok_or_else(|| {
            ScionicError::InvalidLeaf(format!("leaf {} has no classic merkle root", self.hash))
        })?;

        merkle_tree::verify_proof(branch.leaf.as_bytes(), &branch.proof, root)
    }

    /// Drop the link map, keeping the hash-covered fields. Used when a leaf
    /// travels without its children, as in the partial-branch flow.
    pub fn prune_links(&mut self) {
        self.links.clear();
    }

    /// Prefix the stored hash with a label, forming the full identifier.
    pub fn set_label(&mut self, label: &str) {
        self.hash = identifier::compose(label, &self.hash);
    }
}
