//! Shared test fixtures: a deterministic dummy-directory generator and a
//! byte-level directory comparator.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Small deterministic generator so dummy directories are reproducible
/// across runs without seeding global state.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        // xorshift64
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next() & 0xff) as u8).collect()
    }
}

/// Populate `path` with a pseudo-random mix of files and subdirectories.
pub fn generate_dummy_directory(path: &Path, max_items: u64, depth: u32, rng: &mut Rng) {
    fs::create_dir_all(path).expect("create dummy directory");

    if depth == 0 {
        return;
    }

    let items = rng.below(max_items) + 1;
    for i in 0..items {
        if rng.below(2) == 0 && depth > 1 {
            generate_dummy_directory(&path.join(format!("subdir{}", i)), max_items, depth - 1, rng);
        } else {
            let len = rng.below(100) as usize;
            let data = rng.bytes(len);
            fs::write(path.join(format!("file{}.txt", i)), data).expect("write dummy file");
        }
    }
}

/// Relative path -> file contents (None for directories), for the whole
/// subtree under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    let mut entries = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.expect("walk directory");
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("path under walked root")
            .to_path_buf();

        let contents = if entry.file_type().is_dir() {
            None
        } else {
            Some(fs::read(entry.path()).expect("read file"))
        };

        entries.insert(rel, contents);
    }

    entries
}

/// Assert two directory trees have identical structure and file bytes.
pub fn assert_dirs_equal(a: &Path, b: &Path) {
    let left = snapshot(a);
    let right = snapshot(b);

    let left_paths: Vec<_> = left.keys().collect();
    let right_paths: Vec<_> = right.keys().collect();
    assert_eq!(
        left_paths, right_paths,
        "directory structure differs between {:?} and {:?}",
        a, b
    );

    for (path, contents) in &left {
        assert_eq!(
            contents, &right[path],
            "contents differ for {:?}",
            path
        );
    }
}
