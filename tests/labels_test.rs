use scionic_merkle_dag::{
    create_dag, create_dag_with_config, identifier, DagConfig, LeafType, Result,
};
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

mod common;

/// 3072 'A' bytes at chunk size 1024: three chunk children labelled 2, 3, 4
/// whose contents concatenate back to the original bytes in label order.
#[test]
fn test_chunk_labels_and_reassembly() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("aaa.bin");
    let content = vec![b'A'; 3072];
    fs::write(&file, &content)?;

    let config = DagConfig::new().with_chunk_size(1024);
    let dag = create_dag_with_config(&file, config)?;
    dag.verify()?;

    let root_leaf = &dag.leaves[&dag.root];
    assert_eq!(root_leaf.leaf_type, LeafType::File);
    assert_eq!(root_leaf.current_link_count, 3);

    let labels: Vec<&String> = root_leaf
        .sorted_links()?
        .into_iter()
        .map(|(label, _)| label)
        .collect();
    assert_eq!(labels, ["2", "3", "4"]);

    let mut reassembled = Vec::new();
    for (_, chunk_id) in root_leaf.sorted_links()? {
        let chunk = &dag.leaves[chunk_id];
        assert_eq!(chunk.leaf_type, LeafType::Chunk);
        reassembled.extend_from_slice(chunk.content.as_ref().unwrap());
    }
    assert_eq!(reassembled, content);

    assert_eq!(dag.get_content_from_leaf(root_leaf)?, content);

    Ok(())
}

/// Labels form one contiguous ascending run; each is unique and the root's
/// sealed latest label is the maximum.
#[test]
fn test_label_monotonicity() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");

    let mut rng = common::Rng::new(11);
    common::generate_dummy_directory(&input, 5, 3, &mut rng);

    let dag = create_dag(&input, false)?;
    dag.verify()?;

    let mut labels: Vec<u64> = Vec::new();
    for id in dag.leaves.keys() {
        if id == &dag.root {
            continue;
        }
        labels.push(identifier::parse_label(identifier::label_of(id))?);
    }

    let unique: HashSet<u64> = labels.iter().copied().collect();
    assert_eq!(unique.len(), labels.len(), "labels must be unique");

    labels.sort_unstable();
    if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
        // The allocator starts at 1 and hands out latest + 1, so the run
        // begins at 2 and has no gaps.
        assert_eq!(*first, 2);
        assert_eq!(*last, first + labels.len() as u64 - 1);

        let root_leaf = &dag.leaves[&dag.root];
        assert_eq!(root_leaf.latest_label.as_deref(), Some(&*last.to_string()));
    }

    Ok(())
}

/// Iteration follows ascending numeric labels, not lexicographic order, so
/// label 10 comes after label 9.
#[test]
fn test_traversal_is_numeric_label_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dir = temp_dir.path().join("test");
    fs::create_dir(&dir)?;

    // Twelve children pushes labels into double digits
    for i in 0..12 {
        fs::write(dir.join(format!("file{:02}.txt", i)), format!("content{}", i))?;
    }

    let dag = create_dag(&dir, false)?;

    let mut seen: Vec<u64> = Vec::new();
    dag.iterate_dag(&mut |leaf, _| {
        let label = identifier::label_of(&leaf.hash);
        if !label.is_empty() {
            seen.push(identifier::parse_label(label)?);
        }
        Ok(())
    })?;

    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(seen, sorted, "traversal must follow numeric label order");

    Ok(())
}

/// Deeper leaves are labelled before their parents: construction is
/// bottom-up, and the parent's link set can only seal already-built
/// children.
#[test]
fn test_children_labelled_before_parent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let dir = temp_dir.path().join("outer");
    let inner = dir.join("inner");
    fs::create_dir_all(&inner)?;
    fs::write(inner.join("deep.txt"), b"deep")?;

    let dag = create_dag(&dir, false)?;

    let inner_id = dag
        .leaves
        .iter()
        .find(|(_, leaf)| leaf.item_name == "inner")
        .map(|(id, _)| id.clone())
        .unwrap();
    let file_id = dag
        .leaves
        .iter()
        .find(|(_, leaf)| leaf.item_name == "deep.txt")
        .map(|(id, _)| id.clone())
        .unwrap();

    let inner_label = identifier::parse_label(identifier::label_of(&inner_id))?;
    let file_label = identifier::parse_label(identifier::label_of(&file_id))?;

    assert!(file_label < inner_label);

    Ok(())
}

#[test]
fn test_root_is_unlabelled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("test.txt");
    fs::write(&file, b"content")?;

    let dag = create_dag(&file, false)?;

    assert!(!identifier::has_label(&dag.root));
    assert!(dag.leaves.contains_key(&dag.root));

    Ok(())
}
