use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScionicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("leaf must have a type defined")]
    MissingLeafType,

    #[error("hash mismatch for leaf {identifier}: recomputed {computed}")]
    HashMismatch { identifier: String, computed: String },

    #[error("hash mismatch for root leaf {identifier}: recomputed {computed}")]
    RootHashMismatch { identifier: String, computed: String },

    #[error("link points to a leaf missing from the DAG: {0}")]
    DanglingLink(String),

    #[error("parent {parent} does not link to child {child}")]
    MissingParentLink { parent: String, child: String },

    #[error("no parent found for leaf {0}")]
    MissingParent(String),

    #[error("missing leaf: {0}")]
    MissingLeaf(String),

    #[error("label {0} is reserved and cannot be deleted")]
    ReservedLabel(String),

    #[error("label {0} not found in link set")]
    UnknownLabel(String),

    #[error("classic merkle branch failed to verify against root {root}")]
    BranchInvalid { root: String },

    #[error("classic merkle root mismatch for leaf {identifier}: recomputed {computed}")]
    MerkleRootMismatch { identifier: String, computed: String },

    #[error("link count mismatch for leaf {identifier}: {stored} stored, {actual} links")]
    LinkCountMismatch {
        identifier: String,
        stored: usize,
        actual: usize,
    },

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid leaf: {0}")]
    InvalidLeaf(String),

    #[error("invalid DAG: {0}")]
    InvalidDag(String),

    #[error("path not found: {0}")]
    PathNotFound(String),
}

pub type Result<T> = std::result::Result<T, ScionicError>;
