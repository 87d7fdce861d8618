//! # Scionic Merkle DAG
//!
//! Content-addressed encoding of filesystem subtrees, combining the
//! strengths of Classic Merkle Trees and Merkle DAGs.
//!
//! ## Features
//!
//! - **Integrity by construction**: every leaf's identifier is the hash of
//!   its canonical preimage, so any mutation changes the identifier
//! - **Folder support**: store and verify entire directory structures
//! - **Labelled links**: children carry `"label:hash"` identifiers with
//!   monotonically allocated labels, giving a deterministic child order
//! - **Compact branches**: each parent certifies its link set with a
//!   classic Merkle tree, so a single child verifies with a logarithmic
//!   proof
//! - **Partial verifiability**: a root plus a sparse chain of descendants
//!   verifies without the rest of the DAG
//! - **Deterministic reconstruction**: the original directory tree is
//!   recreated byte-identical from the DAG
//!
//! ## Quick Start
//!
//! ```no_run
//! use scionic_merkle_dag::{create_dag, Dag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a DAG from a directory
//! let dag = create_dag("./my-directory", true)?;
//!
//! // Verify the DAG
//! dag.verify()?;
//!
//! // Save to file
//! dag.save_to_file("my-dag.cbor")?;
//!
//! // Load from file
//! let loaded_dag = Dag::load_from_file("my-dag.cbor")?;
//!
//! // Recreate the directory
//! loaded_dag.create_directory("./output-directory")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Partial verification
//!
//! ```no_run
//! use scionic_merkle_dag::create_dag;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dag = create_dag("./my-directory", false)?;
//!
//! // A peer holding only the root can verify one child at a time.
//! let mut root = dag.leaves[&dag.root].clone();
//! let full_root = dag.leaves[&dag.root].clone();
//! root.prune_links();
//! root.verify_root_leaf()?;
//!
//! for (label, child_id) in full_root.sorted_links()? {
//!     let child = &dag.leaves[child_id];
//!     child.verify_leaf()?;
//!
//!     if let Some(branch) = full_root.get_branch(label)? {
//!         root.verify_branch(&branch)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Mutation
//!
//! ```no_run
//! use scionic_merkle_dag::create_dag;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dag = create_dag("./my-directory", false)?;
//!
//! let victim = dag
//!     .leaves
//!     .keys()
//!     .find(|id| **id != dag.root)
//!     .cloned()
//!     .unwrap();
//!
//! // Deleting re-hashes the ancestor chain; the DAG gets a new root.
//! let evicted = dag.delete_leaf(&victim)?;
//! println!("evicted {} leaves", evicted.len());
//! dag.verify()?;
//! # Ok(())
//! # }
//! ```

pub mod dag;
pub mod error;
pub mod identifier;
pub mod leaf;
pub mod merkle_tree;
pub mod mutate;
pub mod serialize;
pub mod types;

// Re-export commonly used items
pub use dag::{create_dag, create_dag_with_config, DagBuilder};
pub use error::{Result, ScionicError};
pub use identifier::IdentifierEncoding;
pub use serialize::read_dag;
pub use types::{
    ClassicTreeBranch, Dag, DagConfig, DagLeaf, DagLeafBuilder, LeafType, MerkleProof,
    DEFAULT_CHUNK_SIZE,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_end_to_end() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let notes = temp_dir.path().join("notes");
        fs::create_dir(&notes)?;

        fs::write(notes.join("monday.md"), b"# Monday\nship the encoder\n")?;
        fs::write(notes.join("tuesday.md"), b"# Tuesday\nreview branch proofs\n")?;

        let archive = notes.join("archive");
        fs::create_dir(&archive)?;
        fs::write(archive.join("2023.md"), b"older entries, kept for reference\n")?;

        let dag = create_dag(&notes, true)?;
        dag.verify()?;

        // Through the on-disk container and back
        let sidecar = temp_dir.path().join("notes.dag");
        dag.save_to_file(&sidecar)?;
        let restored = Dag::load_from_file(&sidecar)?;
        assert_eq!(restored.root, dag.root);
        restored.verify()?;

        let rebuilt = temp_dir.path().join("rebuilt");
        restored.create_directory(&rebuilt)?;

        assert_eq!(
            fs::read(rebuilt.join("monday.md"))?,
            b"# Monday\nship the encoder\n"
        );
        assert_eq!(
            fs::read(rebuilt.join("tuesday.md"))?,
            b"# Tuesday\nreview branch proofs\n"
        );
        assert_eq!(
            fs::read(rebuilt.join("archive").join("2023.md"))?,
            b"older entries, kept for reference\n"
        );

        Ok(())
    }

    #[test]
    fn test_labelled_identifiers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        fs::create_dir(&input_dir)?;

        for i in 0..5 {
            fs::write(
                input_dir.join(format!("file{}.txt", i)),
                format!("Content {}", i),
            )?;
        }

        let dag = create_dag(&input_dir, false)?;

        // The root is stored under its bare hash; every other leaf under
        // its labelled identifier.
        assert!(!identifier::has_label(&dag.root));

        for id in dag.leaves.keys() {
            if id != &dag.root {
                assert!(identifier::has_label(id), "leaf {} has no label", id);
            }
        }

        Ok(())
    }

    #[test]
    fn test_mutation_end_to_end() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        fs::create_dir(&input_dir)?;

        fs::write(input_dir.join("keep.txt"), b"kept")?;
        fs::write(input_dir.join("drop.txt"), b"dropped")?;

        let mut dag = create_dag(&input_dir, false)?;
        let old_root = dag.root.clone();

        let victim = dag
            .leaves
            .iter()
            .find(|(_, leaf)| leaf.item_name == "drop.txt")
            .map(|(id, _)| id.clone())
            .unwrap();

        let evicted = dag.delete_leaf(&victim)?;

        assert!(evicted.contains(&victim));
        assert_ne!(dag.root, old_root);
        dag.verify()?;

        let output_dir = temp_dir.path().join("output");
        dag.create_directory(&output_dir)?;
        assert!(output_dir.join("keep.txt").exists());
        assert!(!output_dir.join("drop.txt").exists());

        Ok(())
    }
}
