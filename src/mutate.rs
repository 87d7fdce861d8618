//! Mutation operations.
//!
//! Leaves are immutable, so deleting or replacing a subtree means producing
//! new leaves: the parent is rebuilt with the edited link set, its parent is
//! rebuilt with the new link value, and so on up to a new root. All edits
//! are staged on a copy of the leaf map and committed only when the whole
//! chain succeeds; a failed mutation leaves the DAG untouched.

use crate::dag::DagBuilder;
use crate::error::{Result, ScionicError};
use crate::identifier;
use crate::types::{Dag, DagLeaf, DagLeafBuilder};
use std::collections::HashMap;

/// The label a metadata leaf would occupy. This implementation never emits
/// one, but DAGs from implementations that reserve it must stay editable
/// without losing it.
const RESERVED_LABEL: &str = "0";

impl Dag {
    /// Delete a leaf and its subtree, re-hashing the ancestor chain up to a
    /// new root. Returns the identifiers evicted from the leaf map.
    pub fn delete_leaf(&mut self, identifier: &str) -> Result<Vec<String>> {
        self.mutate(identifier, None)
    }

    /// Replace a leaf with a newly built one under the same label, evicting
    /// the old subtree and re-hashing the ancestor chain. Children linked by
    /// the new leaf must already be present in the leaf map. Returns the
    /// identifiers evicted from the leaf map.
    pub fn replace_leaf(&mut self, old: &str, new_leaf: DagLeaf) -> Result<Vec<String>> {
        self.mutate(old, Some(new_leaf))
    }

    fn mutate(&mut self, target: &str, replacement: Option<DagLeaf>) -> Result<Vec<String>> {
        let label = identifier::label_of(target).to_string();

        if label == RESERVED_LABEL {
            return Err(ScionicError::ReservedLabel(label));
        }

        if !self.leaves.contains_key(target) {
            return Err(ScionicError::MissingLeaf(target.to_string()));
        }

        let parent_id = self
            .find_parent(target)
            .map(|parent| parent.hash.clone())
            .ok_or_else(|| ScionicError::MissingParent(target.to_string()))?;

        // Stage every change; self is only touched on success.
        let mut staged = self.leaves.clone();

        let parent = staged
            .get_mut(&parent_id)
            .ok_or_else(|| ScionicError::MissingLeaf(parent_id.clone()))?;

        match &replacement {
            None => {
                parent.links.remove(&label);
            }
            Some(new_leaf) => {
                let new_id = identifier::compose(&label, identifier::hash_of(&new_leaf.hash));
                parent.links.insert(label.clone(), new_id);
            }
        }

        if let Some(new_leaf) = replacement {
            for child_id in new_leaf.links.values() {
                if !staged.contains_key(child_id) {
                    return Err(ScionicError::DanglingLink(child_id.clone()));
                }
            }

            let mut new_leaf = new_leaf;
            new_leaf.hash = identifier::compose(&label, identifier::hash_of(&new_leaf.hash));
            staged.insert(new_leaf.hash.clone(), new_leaf);
        }

        let evicted = evict_subtree(&mut staged, target);
        let new_root = rebuild_ancestors(&mut staged, &self.root, parent_id)?;

        self.leaves = staged;
        self.root = new_root;
        self.refresh_parent_hints();

        Ok(evicted)
    }
}

/// Evict a leaf and its descendants from the staged map. An entry survives
/// when some remaining leaf still links its identifier (shared entries
/// stay, and their subtrees are not descended into). Identical content
/// under another label is a separate entry and is never touched.
fn evict_subtree(staged: &mut HashMap<String, DagLeaf>, target: &str) -> Vec<String> {
    let mut evicted = Vec::new();
    let mut queue = vec![target.to_string()];

    while let Some(id) = queue.pop() {
        let referenced = staged
            .values()
            .any(|leaf| leaf.links.values().any(|link| *link == id));

        if referenced {
            continue;
        }

        if let Some(leaf) = staged.remove(&id) {
            queue.extend(leaf.links.values().cloned());
            evicted.push(id);
        }
    }

    evicted
}

/// Rebuild the chain from `start` (a leaf whose link set was edited) up to
/// the root, producing new hashes at every step. Returns the new root hash.
fn rebuild_ancestors(
    staged: &mut HashMap<String, DagLeaf>,
    root: &str,
    start: String,
) -> Result<String> {
    let mut current = start;

    loop {
        let is_root = current == root;

        let old = staged
            .remove(&current)
            .ok_or_else(|| ScionicError::MissingLeaf(current.clone()))?;

        let label = identifier::label_of(&current).to_string();
        let encoding = identifier::encoding_of(identifier::hash_of(&old.hash))?;

        let mut builder =
            DagLeafBuilder::new(old.item_name.clone()).set_type(old.leaf_type.clone());

        if let Some(content) = old.content.clone() {
            builder = builder.set_data(content);
        }

        for (link_label, link_value) in &old.links {
            builder = builder.add_link(link_label, link_value);
        }

        let mut rebuilt = if is_root {
            // The root seals latest_label and leaf_count, both of which may
            // have changed; recompute them over the staged non-root leaves.
            let snapshot = DagBuilder {
                leaves: staged.clone(),
            };
            builder.build_root_leaf(&snapshot, encoding, old.additional_data.clone())?
        } else {
            builder.build_leaf(encoding, old.additional_data.clone())?
        };

        if is_root {
            let new_root = rebuilt.hash.clone();
            staged.insert(new_root.clone(), rebuilt);
            return Ok(new_root);
        }

        rebuilt.set_label(&label);
        let new_id = rebuilt.hash.clone();
        staged.insert(new_id.clone(), rebuilt);

        // Rewrite the link in the parent, which now needs rebuilding too.
        let parent_id = staged
            .iter()
            .find(|(_, leaf)| leaf.has_link(&current))
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ScionicError::MissingParent(current.clone()))?;

        let parent = staged
            .get_mut(&parent_id)
            .ok_or_else(|| ScionicError::MissingLeaf(parent_id.clone()))?;
        parent.links.insert(label, new_id);

        current = parent_id;
    }
}
