use crate::identifier::{self, IdentifierEncoding};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod serde_base64_option {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let encoded = STANDARD.encode(bytes);
                serializer.serialize_some(&encoded)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => STANDARD
                .decode(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Type of leaf in the DAG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    File,
    Chunk,
    Directory,
}

impl std::fmt::Display for LeafType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeafType::File => write!(f, "file"),
            LeafType::Chunk => write!(f, "chunk"),
            LeafType::Directory => write!(f, "directory"),
        }
    }
}

/// A leaf in the Scionic Merkle DAG.
///
/// Leaves are immutable once built; mutation operations replace them with
/// newly hashed leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagLeaf {
    /// Full identifier of this leaf: `"label:hash"`, or the bare hash for
    /// the root.
    #[serde(rename = "Hash")]
    pub hash: String,

    /// Name of the item within its parent (single path component; chunks
    /// use `"<file>/<index>"`).
    #[serde(rename = "ItemName")]
    pub item_name: String,

    /// Type of leaf
    #[serde(rename = "Type")]
    pub leaf_type: LeafType,

    /// SHA-256 of `content`; absent when the leaf carries no body
    #[serde(
        rename = "ContentHash",
        skip_serializing_if = "Option::is_none",
        default,
        with = "serde_base64_option"
    )]
    pub content_hash: Option<Vec<u8>>,

    /// Body bytes; populated for chunks and single-chunk files only
    #[serde(
        rename = "Content",
        skip_serializing_if = "Option::is_none",
        default,
        with = "serde_base64_option"
    )]
    pub content: Option<Vec<u8>>,

    /// Root of the classic Merkle tree over the link set; empty unless the
    /// leaf has at least two links
    #[serde(
        rename = "ClassicMerkleRoot",
        skip_serializing_if = "Option::is_none",
        default,
        with = "serde_base64_option"
    )]
    pub classic_merkle_root: Option<Vec<u8>>,

    /// Number of links this leaf has
    #[serde(rename = "CurrentLinkCount")]
    pub current_link_count: usize,

    /// Highest label allocated in the DAG (root only)
    #[serde(rename = "LatestLabel", skip_serializing_if = "Option::is_none")]
    pub latest_label: Option<String>,

    /// Total number of leaves in the DAG, the root included (root only)
    #[serde(rename = "LeafCount", skip_serializing_if = "Option::is_none")]
    pub leaf_count: Option<usize>,

    /// Child links: label -> `"label:hash"`
    #[serde(rename = "Links", skip_serializing_if = "HashMap::is_empty", default)]
    pub links: HashMap<String, String>,

    /// Parent identifier hint. Not part of the preimage and never trusted
    /// without a `has_link` check.
    #[serde(rename = "ParentHash", skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,

    /// Free-form annotations; keys are serialized in ascending order inside
    /// the preimage
    #[serde(rename = "AdditionalData", skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<HashMap<String, String>>,

    /// Classic Merkle branches keyed by child label, carried by pruned
    /// parents in assembled partial DAGs so `verify` can re-check each
    /// child without the full link set. Never part of the preimage.
    #[serde(
        rename = "stored_proofs",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub proofs: Option<HashMap<String, ClassicTreeBranch>>,
}

/// Classic Merkle branch for a single child link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassicTreeBranch {
    /// The link value (`"label:hash"`) this proof certifies
    #[serde(rename = "Leaf")]
    pub leaf: String,

    /// The Merkle proof
    #[serde(rename = "Proof")]
    pub proof: MerkleProof,
}

/// Merkle proof structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes along the path to root
    #[serde(rename = "Siblings")]
    pub siblings: Vec<serde_bytes::ByteBuf>,

    /// Path bitmap; bit N set means the depth-N sibling is on the right
    #[serde(rename = "Path")]
    pub path: u32,
}

/// The main Scionic Merkle DAG structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    /// Root leaf hash (unlabelled)
    #[serde(rename = "Root")]
    pub root: String,

    /// All leaves indexed by full identifier; the root is keyed by bare hash
    #[serde(rename = "Leafs")]
    pub leaves: HashMap<String, DagLeaf>,
}

/// Chunk size default: 2 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 2048 * 1024;

/// Configuration for DAG construction.
///
/// The chunk size lives here rather than in process-wide state; callers that
/// need a different size pass a config instead of mutating a global.
#[derive(Debug, Clone)]
pub struct DagConfig {
    /// Maximum bytes per chunk leaf
    pub chunk_size: usize,

    /// How leaf digests are rendered into identifier strings
    pub encoding: IdentifierEncoding,

    /// Stamp the root's additional data with the build time (RFC 3339 UTC)
    pub timestamp_root: bool,

    /// Additional metadata for the root leaf
    pub additional_data: HashMap<String, String>,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            encoding: IdentifierEncoding::default(),
            timestamp_root: false,
            additional_data: HashMap::new(),
        }
    }
}

impl DagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_encoding(mut self, encoding: IdentifierEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_timestamp(mut self) -> Self {
        self.timestamp_root = true;
        self
    }

    pub fn with_additional_data(mut self, data: HashMap<String, String>) -> Self {
        self.additional_data = data;
        self
    }
}

/// Builder for constructing DAG leaves
pub struct DagLeafBuilder {
    pub(crate) item_name: String,
    pub(crate) leaf_type: Option<LeafType>,
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) links: HashMap<String, String>,
}

impl DagLeafBuilder {
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            leaf_type: None,
            data: None,
            links: HashMap::new(),
        }
    }

    pub fn set_type(mut self, leaf_type: LeafType) -> Self {
        self.leaf_type = Some(leaf_type);
        self
    }

    pub fn set_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    /// Record a link to a child under its label. The stored value is the
    /// child's full identifier, `"label:hash"`.
    pub fn add_link(mut self, label: &str, child_hash: &str) -> Self {
        self.links.insert(
            label.to_string(),
            identifier::compose(label, identifier::hash_of(child_hash)),
        );
        self
    }
}
