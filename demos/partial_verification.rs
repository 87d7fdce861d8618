//! Walks a root-to-leaf chain the way a syncing peer would: verify the
//! links-stripped root first, then each descendant with a classic Merkle
//! branch fetched from the full source.

use anyhow::Result;
use scionic_merkle_dag::{create_dag, DagBuilder, LeafType};
use std::fs;
use tempfile::TempDir;

fn main() -> Result<()> {
    println!("=== Scionic Merkle DAG - Partial Verification ===\n");

    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("input");
    fs::create_dir(&input_dir)?;

    for i in 0..4 {
        fs::write(
            input_dir.join(format!("file{}.txt", i)),
            format!("content {}", i),
        )?;
    }
    let nested = input_dir.join("nested");
    fs::create_dir(&nested)?;
    fs::write(nested.join("deep.txt"), b"deep content")?;

    // The "source" peer holds the full DAG.
    let source = create_dag(&input_dir, false)?;
    source.verify()?;
    println!("Source DAG has {} leaves, root {}\n", source.leaves.len(), source.root);

    // The receiving peer starts from nothing but the root leaf, links
    // stripped, and verifies it stands alone.
    let mut received_root = source.leaves[&source.root].clone();
    received_root.prune_links();
    received_root.verify_root_leaf()?;
    println!("Root leaf verified without links");

    let mut builder = DagBuilder::new();
    builder.add_leaf(received_root.clone(), None)?;

    // Fetch one directory child and one of its files, verifying each
    // against the parent's classic Merkle root before accepting it.
    let full_root = &source.leaves[&source.root];
    let mut parent_id = source.root.clone();
    let mut parent_clone = received_root;

    loop {
        let source_parent = &source.leaves[&parent_id];
        if source_parent.links.is_empty() {
            break;
        }

        let (label, child_id) = source_parent.sorted_links()?[0];
        let mut child = source.leaves[child_id].clone();
        child.prune_links();
        child.verify_leaf()?;

        let branch = source_parent.get_branch(label)?;
        match &branch {
            Some(branch) => {
                parent_clone.verify_branch(branch)?;
                println!("Branch for label {} verified ({} siblings)", label, branch.proof.siblings.len());
            }
            None => println!("Single child under {}, no branch needed", parent_id),
        }

        // The branch stays with the assembled DAG, so the final verify()
        // re-checks it instead of trusting the steps above.
        builder.add_leaf_with_branch(child.clone(), parent_id.as_str(), branch)?;

        if child.leaf_type != LeafType::Directory {
            break;
        }

        parent_id = child_id.clone();
        parent_clone = child;
    }

    let partial = builder.build_dag(source.root.clone());
    println!(
        "\nPartial DAG holds {} of {} leaves",
        partial.leaves.len(),
        full_root.leaf_count.unwrap_or_default()
    );

    partial.verify()?;
    println!("Partial DAG verified");

    Ok(())
}
