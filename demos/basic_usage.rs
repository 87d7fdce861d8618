use anyhow::Result;
use scionic_merkle_dag::{create_dag, Dag};
use std::fs;
use tempfile::TempDir;

fn main() -> Result<()> {
    println!("=== Scionic Merkle DAG - Basic Usage ===\n");

    // Create a temporary directory for demonstration
    let temp_dir = TempDir::new()?;
    let input_dir = temp_dir.path().join("example_input");
    fs::create_dir(&input_dir)?;

    println!("1. Creating example files...");
    fs::write(input_dir.join("readme.txt"), b"Welcome to Scionic Merkle DAGs!")?;
    fs::write(input_dir.join("data.txt"), b"Some important data here.")?;

    let subdir = input_dir.join("documents");
    fs::create_dir(&subdir)?;
    fs::write(subdir.join("doc1.txt"), b"Document 1 content")?;
    fs::write(subdir.join("doc2.txt"), b"Document 2 content")?;

    println!("   Created 4 files in 2 directories\n");

    println!("2. Creating the DAG...");
    let dag = create_dag(&input_dir, true)?;

    println!("   Root: {}", dag.root);
    println!("   Total leaves: {}\n", dag.leaves.len());

    println!("3. Verifying DAG integrity...");
    dag.verify()?;
    println!("   DAG verified successfully\n");

    let dag_file = temp_dir.path().join("example.dag");
    println!("4. Saving DAG to file...");
    dag.save_to_file(&dag_file)?;

    let file_size = fs::metadata(&dag_file)?.len();
    println!("   Saved to: {}", dag_file.display());
    println!("   File size: {} bytes\n", file_size);

    println!("5. Loading and re-verifying...");
    let loaded_dag = Dag::load_from_file(&dag_file)?;
    loaded_dag.verify()?;
    println!("   Loaded DAG verified\n");

    let output_dir = temp_dir.path().join("example_output");
    println!("6. Recreating directory from DAG...");
    loaded_dag.create_directory(&output_dir)?;
    println!("   Recreated at: {}\n", output_dir.display());

    println!("7. Inspecting leaves...");
    for (id, leaf) in &loaded_dag.leaves {
        let content_hash = leaf
            .content_hash
            .as_ref()
            .map(hex::encode)
            .unwrap_or_else(|| "-".to_string());
        println!("   [{}] {} ({}) content sha256: {}", id, leaf.item_name, leaf.leaf_type, content_hash);
    }

    Ok(())
}
