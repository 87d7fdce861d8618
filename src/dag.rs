use crate::error::{Result, ScionicError};
use crate::identifier;
use crate::leaf::build_link_tree;
use crate::types::{ClassicTreeBranch, Dag, DagConfig, DagLeaf, DagLeafBuilder, LeafType};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Create a DAG from a file or directory
pub fn create_dag(path: impl AsRef<Path>, timestamp_root: bool) -> Result<Dag> {
    let config = DagConfig {
        timestamp_root,
        ..DagConfig::default()
    };

    create_dag_with_config(path, config)
}

/// Create a DAG with custom configuration
pub fn create_dag_with_config(path: impl AsRef<Path>, config: DagConfig) -> Result<Dag> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ScionicError::PathNotFound(path.display().to_string()));
    }

    let mut builder = DagBuilder::new();
    let metadata = fs::metadata(path)?;

    let root_leaf = if metadata.is_dir() {
        process_directory(path, &mut builder, true, &config)?
    } else {
        process_file(path, &mut builder, true, &config)?
    };

    let root_hash = root_leaf.hash.clone();
    builder.add_leaf(root_leaf, None)?;

    let mut dag = builder.build_dag(root_hash);
    dag.refresh_parent_hints();

    Ok(dag)
}

fn item_name_of(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// Root additional data from the config; the timestamp is stamped at build
/// time in RFC 3339 UTC.
fn root_additional_data(config: &DagConfig) -> Option<HashMap<String, String>> {
    let mut data = config.additional_data.clone();

    if config.timestamp_root {
        data.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());
    }

    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Process a directory bottom-up: children are emitted and labelled first,
/// then the directory leaf seals their link set.
fn process_directory(
    path: &Path,
    builder: &mut DagBuilder,
    is_root: bool,
    config: &DagConfig,
) -> Result<DagLeaf> {
    let mut leaf_builder =
        DagLeafBuilder::new(item_name_of(path, "root")).set_type(LeafType::Directory);

    let mut entries: Vec<_> = fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;

    // Entry iteration order determines label assignment; sort for
    // deterministic roots across runs and platforms.
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let entry_path = entry.path();

        let mut child = if entry.metadata()?.is_dir() {
            process_directory(&entry_path, builder, false, config)?
        } else {
            process_file(&entry_path, builder, false, config)?
        };

        let label = builder.next_label();
        leaf_builder = leaf_builder.add_link(&label, &child.hash);
        child.set_label(&label);
        builder.add_leaf(child, None)?;
    }

    if is_root {
        leaf_builder.build_root_leaf(builder, config.encoding, root_additional_data(config))
    } else {
        leaf_builder.build_leaf(config.encoding, None)
    }
}

/// Process a file, chunking it when it exceeds the configured chunk size.
/// A file that fits in a single chunk carries its body inline and has no
/// children.
fn process_file(
    path: &Path,
    builder: &mut DagBuilder,
    is_root: bool,
    config: &DagConfig,
) -> Result<DagLeaf> {
    let item_name = item_name_of(path, "file");
    let data = fs::read(path)?;

    let mut leaf_builder = DagLeafBuilder::new(item_name.clone()).set_type(LeafType::File);

    if config.chunk_size > 0 && data.len() > config.chunk_size {
        for (i, chunk) in data.chunks(config.chunk_size).enumerate() {
            let mut chunk_leaf = DagLeafBuilder::new(format!("{}/{}", item_name, i))
                .set_type(LeafType::Chunk)
                .set_data(chunk.to_vec())
                .build_leaf(config.encoding, None)?;

            let label = builder.next_label();
            leaf_builder = leaf_builder.add_link(&label, &chunk_leaf.hash);
            chunk_leaf.set_label(&label);
            builder.add_leaf(chunk_leaf, None)?;
        }
    } else {
        leaf_builder = leaf_builder.set_data(data);
    }

    if is_root {
        leaf_builder.build_root_leaf(builder, config.encoding, root_additional_data(config))
    } else {
        leaf_builder.build_leaf(config.encoding, None)
    }
}

/// Builder for constructing DAGs.
///
/// Leaves are keyed by full identifier; the root is keyed by bare hash.
pub struct DagBuilder {
    pub leaves: HashMap<String, DagLeaf>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self {
            leaves: HashMap::new(),
        }
    }

    /// Highest label among stored leaves; 1 when none carries a label.
    pub fn latest_label(&self) -> String {
        let mut latest: u64 = 1;

        for key in self.leaves.keys() {
            let label = identifier::label_of(key);
            if label.is_empty() {
                continue;
            }
            if let Ok(parsed) = identifier::parse_label(label) {
                if parsed > latest {
                    latest = parsed;
                }
            }
        }

        latest.to_string()
    }

    /// Allocate the next label: latest + 1, as a decimal string.
    pub fn next_label(&self) -> String {
        let latest = identifier::parse_label(&self.latest_label()).unwrap_or(1);
        (latest + 1).to_string()
    }

    /// Store a leaf under its identifier. With a parent given, the leaf's
    /// link is inserted into the parent's link set when not already there
    /// (the partial-DAG assembly path).
    pub fn add_leaf(&mut self, leaf: DagLeaf, parent: Option<&str>) -> Result<()> {
        if let Some(parent_id) = parent {
            let label = identifier::label_of(&leaf.hash).to_string();
            if label.is_empty() {
                return Err(ScionicError::InvalidLabel(format!(
                    "leaf {} has no label, cannot link under a parent",
                    leaf.hash
                )));
            }

            let parent_leaf = self
                .leaves
                .get_mut(parent_id)
                .ok_or_else(|| ScionicError::MissingLeaf(parent_id.to_string()))?;

            parent_leaf
                .links
                .entry(label)
                .or_insert_with(|| leaf.hash.clone());
        }

        self.leaves.insert(leaf.hash.clone(), leaf);

        Ok(())
    }

    /// Store a leaf under a parent together with the classic Merkle branch
    /// that certifies it, keeping the branch on the parent so a later
    /// `verify` re-checks it without the parent's full link set. `None` is
    /// accepted for children of single-link parents, which have no classic
    /// tree.
    pub fn add_leaf_with_branch(
        &mut self,
        leaf: DagLeaf,
        parent: &str,
        branch: Option<ClassicTreeBranch>,
    ) -> Result<()> {
        if let Some(branch) = &branch {
            if !identifier::has_label(&branch.leaf) {
                return Err(ScionicError::InvalidLabel(format!(
                    "branch target {} has no label",
                    branch.leaf
                )));
            }
        }

        self.add_leaf(leaf, Some(parent))?;

        if let Some(branch) = branch {
            let label = identifier::label_of(&branch.leaf).to_string();

            let parent_leaf = self
                .leaves
                .get_mut(parent)
                .ok_or_else(|| ScionicError::MissingLeaf(parent.to_string()))?;

            parent_leaf
                .proofs
                .get_or_insert_with(HashMap::new)
                .insert(label, branch);
        }

        Ok(())
    }

    /// Freeze into an immutable DAG.
    pub fn build_dag(self, root: String) -> Dag {
        Dag {
            root,
            leaves: self.leaves,
        }
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Dag {
    /// Verify the DAG: full verification when every leaf is present,
    /// branch-based partial verification otherwise.
    pub fn verify(&self) -> Result<()> {
        if self.is_partial() {
            self.verify_partial()
        } else {
            self.verify_full()
        }
    }

    /// Whether leaves are missing relative to the root's sealed leaf count.
    pub fn is_partial(&self) -> bool {
        if let Some(root_leaf) = self.leaves.get(&self.root) {
            if let Some(leaf_count) = root_leaf.leaf_count {
                return self.leaves.len() < leaf_count;
            }
        }
        true
    }

    /// Full verification: walk from the root in label order and check every
    /// leaf's preimage hash, link-count and classic-root consistency, and
    /// parent linkage. The links map is not covered by the preimage, which
    /// is why the classic root is recomputed here.
    fn verify_full(&self) -> Result<()> {
        let mut visited = 0usize;

        self.iterate_dag(&mut |leaf, parent| {
            visited += 1;

            if leaf.hash == self.root {
                leaf.verify_root_leaf()?;
            } else {
                leaf.verify_leaf()?;

                let parent = parent
                    .ok_or_else(|| ScionicError::MissingParent(leaf.hash.clone()))?;
                if !parent.has_link(&leaf.hash) {
                    return Err(ScionicError::MissingParentLink {
                        parent: parent.hash.clone(),
                        child: leaf.hash.clone(),
                    });
                }
            }

            if leaf.links.len() != leaf.current_link_count {
                return Err(ScionicError::LinkCountMismatch {
                    identifier: leaf.hash.clone(),
                    stored: leaf.current_link_count,
                    actual: leaf.links.len(),
                });
            }

            if leaf.links.len() >= 2 {
                let computed = build_link_tree(&leaf.links)?.root;
                if Some(&computed) != leaf.classic_merkle_root.as_ref() {
                    return Err(ScionicError::MerkleRootMismatch {
                        identifier: leaf.hash.clone(),
                        computed: hex::encode(computed),
                    });
                }
            }

            Ok(())
        })?;

        if visited != self.leaves.len() {
            return Err(ScionicError::InvalidDag(format!(
                "{} of {} leaves are not reachable from the root",
                self.leaves.len() - visited,
                self.leaves.len()
            )));
        }

        Ok(())
    }

    /// Partial verification: every present leaf must hash-verify, be linked
    /// from a present parent, and carry a valid classic Merkle branch under
    /// that parent whenever the parent has more than one child. A parent
    /// with its full link set yields the branch by recomputation; a pruned
    /// parent must have been assembled with the branch it fetched
    /// (`DagBuilder::add_leaf_with_branch`), and a missing branch fails
    /// verification rather than being skipped.
    fn verify_partial(&self) -> Result<()> {
        let root_leaf = self
            .leaves
            .get(&self.root)
            .ok_or_else(|| ScionicError::MissingLeaf(self.root.clone()))?;

        root_leaf.verify_root_leaf()?;

        for (id, leaf) in &self.leaves {
            if id == &self.root {
                continue;
            }

            leaf.verify_leaf()?;

            let parent = self
                .find_parent(id)
                .ok_or_else(|| ScionicError::MissingParent(id.clone()))?;

            // A single-link parent has no classic tree; the link itself is
            // sealed by the parent's preimage via the link count.
            if parent.current_link_count < 2 {
                continue;
            }

            let label = identifier::label_of(id);

            let branch = if parent.links.len() == parent.current_link_count {
                parent.get_branch(label)?.ok_or_else(|| {
                    ScionicError::InvalidDag(format!(
                        "no branch for label {} under parent {}",
                        label, parent.hash
                    ))
                })?
            } else {
                parent
                    .proofs
                    .as_ref()
                    .and_then(|proofs| proofs.get(label))
                    .cloned()
                    .ok_or_else(|| {
                        ScionicError::InvalidDag(format!(
                            "parent {} carries no branch for leaf {}",
                            parent.hash, id
                        ))
                    })?
            };

            if branch.leaf != *id {
                return Err(ScionicError::InvalidDag(format!(
                    "branch under label {} certifies {} instead of {}",
                    label, branch.leaf, id
                )));
            }

            parent.verify_branch(&branch)?;
        }

        Ok(())
    }

    /// Find the parent of a leaf: the `parent_hash` hint when it still
    /// holds, a scan over the leaf set otherwise.
    pub fn find_parent(&self, child: &str) -> Option<&DagLeaf> {
        if let Some(hint) = self
            .leaves
            .get(child)
            .and_then(|leaf| leaf.parent_hash.as_ref())
        {
            if let Some(parent) = self.leaves.get(hint) {
                if parent.has_link(child) {
                    return Some(parent);
                }
            }
        }

        self.leaves.values().find(|leaf| leaf.has_link(child))
    }

    /// Rebuild every non-root leaf's `parent_hash` hint from the link maps.
    pub(crate) fn refresh_parent_hints(&mut self) {
        let mut pairs: Vec<(String, String)> = Vec::new();

        for (parent_id, leaf) in &self.leaves {
            for child_id in leaf.links.values() {
                pairs.push((child_id.clone(), parent_id.clone()));
            }
        }

        for (child_id, parent_id) in pairs {
            if let Some(child) = self.leaves.get_mut(&child_id) {
                child.parent_hash = Some(parent_id);
            }
        }
    }

    /// Depth-first traversal from the root, children in ascending numeric
    /// label order. The visitor receives each leaf with its parent (`None`
    /// for the root), once per leaf even when a malformed input links it
    /// from two places. A link to an absent leaf aborts with
    /// `DanglingLink`.
    pub fn iterate_dag<F>(&self, visit: &mut F) -> Result<()>
    where
        F: FnMut(&DagLeaf, Option<&DagLeaf>) -> Result<()>,
    {
        let mut seen = HashSet::new();
        self.walk(&self.root, None, &mut seen, visit)
    }

    fn walk<F>(
        &self,
        id: &str,
        parent: Option<&str>,
        seen: &mut HashSet<String>,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&DagLeaf, Option<&DagLeaf>) -> Result<()>,
    {
        let leaf = self
            .leaves
            .get(id)
            .ok_or_else(|| ScionicError::DanglingLink(id.to_string()))?;

        if !seen.insert(id.to_string()) {
            return Ok(());
        }

        visit(leaf, parent.and_then(|p| self.leaves.get(p)))?;

        for (_, child_id) in leaf.sorted_links()? {
            self.walk(child_id, Some(id), seen, visit)?;
        }

        Ok(())
    }

    /// Recreate the filesystem subtree this DAG encodes.
    pub fn create_directory(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let root_leaf = self
            .leaves
            .get(&self.root)
            .ok_or_else(|| ScionicError::MissingLeaf(self.root.clone()))?;

        let output_path = output_path.as_ref();

        match root_leaf.leaf_type {
            LeafType::Directory => {
                fs::create_dir_all(output_path)?;

                for (_, child_id) in root_leaf.sorted_links()? {
                    let child = self
                        .leaves
                        .get(child_id)
                        .ok_or_else(|| ScionicError::DanglingLink(child_id.clone()))?;

                    self.write_leaf(child, &output_path.join(&child.item_name))?;
                }
            }
            LeafType::File => {
                fs::create_dir_all(output_path)?;

                let content = self.get_content_from_leaf(root_leaf)?;
                fs::write(output_path.join(&root_leaf.item_name), content)?;
            }
            LeafType::Chunk => {
                return Err(ScionicError::InvalidDag(
                    "root cannot be a chunk".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn write_leaf(&self, leaf: &DagLeaf, path: &Path) -> Result<()> {
        match leaf.leaf_type {
            LeafType::Directory => {
                fs::create_dir_all(path)?;

                for (_, child_id) in leaf.sorted_links()? {
                    let child = self
                        .leaves
                        .get(child_id)
                        .ok_or_else(|| ScionicError::DanglingLink(child_id.clone()))?;

                    self.write_leaf(child, &path.join(&child.item_name))?;
                }
            }
            LeafType::File => {
                let content = self.get_content_from_leaf(leaf)?;
                fs::write(path, content)?;
            }
            LeafType::Chunk => {
                // Chunks are materialized by their parent file.
            }
        }

        Ok(())
    }

    /// Full body of a file leaf: chunk contents concatenated in ascending
    /// label order, or the inline content for single-chunk files.
    pub fn get_content_from_leaf(&self, leaf: &DagLeaf) -> Result<Vec<u8>> {
        if leaf.links.is_empty() {
            return Ok(leaf.content.clone().unwrap_or_default());
        }

        let mut content = Vec::new();

        for (_, child_id) in leaf.sorted_links()? {
            let chunk = self
                .leaves
                .get(child_id)
                .ok_or_else(|| ScionicError::DanglingLink(child_id.clone()))?;

            let chunk_content = chunk.content.as_ref().ok_or_else(|| {
                ScionicError::InvalidLeaf(format!("chunk {} has no content", chunk.hash))
            })?;

            content.extend_from_slice(chunk_content);
        }

        Ok(content)
    }

    /// Sub-DAG containing the requested leaves plus their paths to the
    /// root. Leaves are cloned with their link maps intact, so the result
    /// passes partial verification with branch checks.
    pub fn get_partial(&self, identifiers: &[String]) -> Result<Dag> {
        if identifiers.is_empty() {
            return Err(ScionicError::InvalidDag(
                "no leaf identifiers provided".to_string(),
            ));
        }

        let mut partial_leaves = HashMap::new();

        let root_leaf = self
            .leaves
            .get(&self.root)
            .ok_or_else(|| ScionicError::MissingLeaf(self.root.clone()))?;
        partial_leaves.insert(self.root.clone(), root_leaf.clone());

        for id in identifiers {
            let leaf = self
                .leaves
                .get(id)
                .ok_or_else(|| ScionicError::MissingLeaf(id.clone()))?;

            partial_leaves.insert(id.clone(), leaf.clone());

            let mut current = id.clone();
            while current != self.root {
                let parent = self
                    .find_parent(&current)
                    .ok_or_else(|| ScionicError::MissingParent(current.clone()))?;

                partial_leaves.insert(parent.hash.clone(), parent.clone());
                current = parent.hash.clone();
            }
        }

        Ok(Dag {
            root: self.root.clone(),
            leaves: partial_leaves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_file_dag() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let manifest = temp_dir.path().join("manifest.yaml");
        fs::write(&manifest, b"schema: 3\nentries: 12\n")?;

        let dag = create_dag(&manifest, false)?;

        assert!(!dag.root.is_empty());
        assert_eq!(dag.leaves.len(), 1);

        let root_leaf = &dag.leaves[&dag.root];
        assert_eq!(root_leaf.item_name, "manifest.yaml");
        assert_eq!(root_leaf.content.as_deref(), Some(&b"schema: 3\nentries: 12\n"[..]));

        Ok(())
    }

    #[test]
    fn test_directory_dag() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let album = temp_dir.path().join("album");
        fs::create_dir(&album)?;
        fs::write(album.join("cover.raw"), vec![0x42u8; 64])?;
        fs::write(album.join("tracklist.txt"), b"1. opener\n2. closer\n")?;

        let dag = create_dag(&album, false)?;

        assert_eq!(dag.leaves.len(), 3);

        let root_leaf = dag.leaves.get(&dag.root).unwrap();
        assert_eq!(root_leaf.leaf_type, LeafType::Directory);
        assert_eq!(root_leaf.current_link_count, 2);
        assert_eq!(root_leaf.leaf_count, Some(3));

        Ok(())
    }

    #[test]
    fn test_fresh_dag_verifies() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let snapshot = temp_dir.path().join("state.snapshot");
        fs::write(&snapshot, b"epoch=7;checkpoint=91")?;

        let dag = create_dag(&snapshot, false)?;
        dag.verify()?;

        Ok(())
    }

    #[test]
    fn test_label_allocation() -> Result<()> {
        let mut builder = DagBuilder::new();
        assert_eq!(builder.latest_label(), "1");
        assert_eq!(builder.next_label(), "2");

        let mut leaf = DagLeafBuilder::new("a.txt")
            .set_type(LeafType::File)
            .set_data(b"a".to_vec())
            .build_leaf(Default::default(), None)?;
        leaf.set_label("2");
        builder.add_leaf(leaf, None)?;

        assert_eq!(builder.latest_label(), "2");
        assert_eq!(builder.next_label(), "3");

        Ok(())
    }

    #[test]
    fn test_parent_hints_populated() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dir_path = temp_dir.path().join("test_dir");
        fs::create_dir(&dir_path)?;
        fs::write(dir_path.join("file.txt"), b"content")?;

        let dag = create_dag(&dir_path, false)?;

        for (id, leaf) in &dag.leaves {
            if id == &dag.root {
                continue;
            }
            let hint = leaf.parent_hash.as_ref().expect("missing parent hint");
            assert!(dag.leaves[hint].has_link(id));
        }

        Ok(())
    }
}
