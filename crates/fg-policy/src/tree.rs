// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sparse nested-mapping trees and their structural merge.
//!
//! A [`Tree`] maps string keys to either a leaf value or a sub-mapping, to
//! any depth. [`merge_with`] overlays several trees: keys present in one
//! input are carried through untouched, colliding leaves are reduced by a
//! caller-supplied combiner, and a leaf colliding with a sub-mapping is a
//! [`ShapeMismatch`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

// ---------------------------------------------------------------------------
// TreeNode / Tree
// ---------------------------------------------------------------------------

/// One node of a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreeNode<T> {
    /// A value.
    Leaf(T),
    /// A mapping to further nodes.
    Branch(BTreeMap<String, TreeNode<T>>),
}

impl<T> TreeNode<T> {
    fn map<U>(self, f: &mut impl FnMut(T) -> U) -> TreeNode<U> {
        match self {
            Self::Leaf(v) => TreeNode::Leaf(f(v)),
            Self::Branch(m) => TreeNode::Branch(map_children(m, f)),
        }
    }

    fn map_ref<U>(&self, f: &mut impl FnMut(&T) -> U) -> TreeNode<U> {
        match self {
            Self::Leaf(v) => TreeNode::Leaf(f(v)),
            Self::Branch(m) => TreeNode::Branch(
                m.iter().map(|(k, n)| (k.clone(), n.map_ref(f))).collect(),
            ),
        }
    }

    fn collect_leaves<'a>(
        &'a self,
        prefix: &mut Vec<&'a str>,
        out: &mut Vec<(Vec<&'a str>, &'a T)>,
    ) {
        match self {
            Self::Leaf(v) => out.push((prefix.clone(), v)),
            Self::Branch(m) => {
                for (k, n) in m {
                    prefix.push(k);
                    n.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

fn map_children<T, U>(
    m: BTreeMap<String, TreeNode<T>>,
    f: &mut impl FnMut(T) -> U,
) -> BTreeMap<String, TreeNode<U>> {
    m.into_iter().map(|(k, n)| (k, n.map(f))).collect()
}

/// A sparse tree with string keys and leaves of type `T`.
///
/// The root is always a mapping. Serialises as nested JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tree<T> {
    root: BTreeMap<String, TreeNode<T>>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            root: BTreeMap::new(),
        }
    }
}

impl<T> Tree<T> {
    /// The empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a two-level tree from `(section, [(key, leaf)])` pairs.
    ///
    /// A section named twice is extended. A key declared twice within a
    /// section is an error.
    pub fn from_sections<S, F>(sections: S) -> Result<Self, TreeError>
    where
        S: IntoIterator<Item = (&'static str, F)>,
        F: IntoIterator<Item = (&'static str, T)>,
    {
        let mut tree = Self::new();
        for (section, leaves) in sections {
            for (key, leaf) in leaves {
                tree.insert(&[section, key], leaf)?;
            }
        }
        Ok(tree)
    }

    /// Insert `value` at `path`, creating intermediate mappings.
    ///
    /// Fails when `path` already holds a value, when a leaf sits on the way
    /// to it, or when it already names a sub-mapping. The tree is left
    /// unchanged on failure.
    pub fn insert(&mut self, path: &[&str], value: T) -> Result<(), TreeError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(TreeError::EmptyPath);
        };
        let mut map = &mut self.root;
        for (depth, key) in parents.iter().enumerate() {
            let node = map
                .entry((*key).to_string())
                .or_insert_with(|| TreeNode::Branch(BTreeMap::new()));
            let TreeNode::Branch(m) = node else {
                return Err(ShapeMismatch {
                    path: path[..=depth].join("."),
                }
                .into());
            };
            map = m;
        }
        match map.entry((*last).to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(TreeNode::Leaf(value));
                Ok(())
            }
            Entry::Occupied(slot) => match slot.get() {
                TreeNode::Leaf(_) => Err(TreeError::Duplicate {
                    path: path.join("."),
                }),
                TreeNode::Branch(_) => Err(ShapeMismatch {
                    path: path.join("."),
                }
                .into()),
            },
        }
    }

    /// Node at `path`; the empty path is not a node.
    pub fn get(&self, path: &[&str]) -> Option<&TreeNode<T>> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(*first)?;
        for key in rest {
            node = match node {
                TreeNode::Branch(m) => m.get(*key)?,
                TreeNode::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// Leaf value at `path`.
    pub fn leaf(&self, path: &[&str]) -> Option<&T> {
        match self.get(path)? {
            TreeNode::Leaf(v) => Some(v),
            TreeNode::Branch(_) => None,
        }
    }

    /// Top-level entries.
    pub fn entries(&self) -> &BTreeMap<String, TreeNode<T>> {
        &self.root
    }

    /// Every leaf with its path, in key order.
    pub fn leaves(&self) -> Vec<(Vec<&str>, &T)> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        for (k, n) in &self.root {
            prefix.push(k.as_str());
            n.collect_leaves(&mut prefix, &mut out);
            prefix.pop();
        }
        out
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves().len()
    }

    /// Whether the tree holds no leaves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transform every leaf, keeping the shape.
    pub fn map_leaves<U>(self, mut f: impl FnMut(T) -> U) -> Tree<U> {
        Tree {
            root: map_children(self.root, &mut f),
        }
    }

    /// Like [`Tree::map_leaves`] but borrowing.
    pub fn map_leaves_ref<U>(&self, mut f: impl FnMut(&T) -> U) -> Tree<U> {
        Tree {
            root: self
                .root
                .iter()
                .map(|(k, n)| (k.clone(), n.map_ref(&mut f)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Two inputs disagree on whether a path is a leaf or a sub-mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("shape mismatch at '{path}': a leaf collides with a sub-mapping")]
pub struct ShapeMismatch {
    /// Dotted path of the collision.
    pub path: String,
}

/// A declaration that cannot be added to a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A leaf and a sub-mapping claim the same path.
    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
    /// The path already holds a value.
    #[error("'{path}' is declared more than once")]
    Duplicate {
        /// Dotted path of the second declaration.
        path: String,
    },
    /// Values need at least one key.
    #[error("empty path")]
    EmptyPath,
}

/// Merge `trees` into one.
///
/// Keys present in a single input are copied through unchanged. Where
/// leaves collide, `combine` receives them in input order. Merging zero
/// trees yields the empty tree.
pub fn merge_with<T>(
    trees: impl IntoIterator<Item = Tree<T>>,
    mut combine: impl FnMut(Vec<T>) -> T,
) -> Result<Tree<T>, ShapeMismatch> {
    let mut acc: BTreeMap<String, TreeNode<Vec<T>>> = BTreeMap::new();
    let mut path = Vec::new();
    for tree in trees {
        let wrapped = tree.map_leaves(|leaf| vec![leaf]);
        merge_maps(&mut acc, wrapped.root, &mut path)?;
    }
    let merged = Tree { root: acc };
    Ok(merged.map_leaves(|mut leaves| {
        if leaves.len() == 1 {
            leaves.remove(0)
        } else {
            combine(leaves)
        }
    }))
}

fn merge_maps<T>(
    into: &mut BTreeMap<String, TreeNode<Vec<T>>>,
    from: BTreeMap<String, TreeNode<Vec<T>>>,
    path: &mut Vec<String>,
) -> Result<(), ShapeMismatch> {
    for (key, node) in from {
        let Some(existing) = into.remove(&key) else {
            into.insert(key, node);
            continue;
        };
        path.push(key.clone());
        let merged = match (existing, node) {
            (TreeNode::Leaf(mut a), TreeNode::Leaf(b)) => {
                a.extend(b);
                TreeNode::Leaf(a)
            }
            (TreeNode::Branch(mut a), TreeNode::Branch(b)) => {
                merge_maps(&mut a, b, path)?;
                TreeNode::Branch(a)
            }
            _ => {
                return Err(ShapeMismatch {
                    path: path.join("."),
                });
            }
        };
        path.pop();
        into.insert(key, merged);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(entries: &[(&str, i32)]) -> Tree<i32> {
        let mut t = Tree::new();
        for (path, v) in entries {
            let keys: Vec<&str> = path.split('.').collect();
            t.insert(&keys, *v).unwrap();
        }
        t
    }

    fn sum(v: Vec<i32>) -> i32 {
        v.into_iter().sum()
    }

    #[test]
    fn insert_and_lookup() {
        let t = tree(&[("Event.title", 1), ("Event.owner", 2)]);
        assert_eq!(t.leaf(&["Event", "title"]), Some(&1));
        assert!(t.leaf(&["Event"]).is_none());
        assert!(t.get(&["Event", "title", "deeper"]).is_none());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn from_sections_builds_two_levels() {
        let t = Tree::from_sections([
            ("User", vec![("_id", 1), ("name", 2)]),
            ("User", vec![("role", 3)]),
        ])
        .unwrap();
        let paths: Vec<_> = t.leaves().into_iter().map(|(p, _)| p.join(".")).collect();
        assert_eq!(paths, vec!["User._id", "User.name", "User.role"]);
    }

    #[test]
    fn key_declared_twice_is_rejected() {
        let err = Tree::from_sections([("Event", vec![("title", 1), ("title", 2)])]).unwrap_err();
        assert_eq!(
            err,
            TreeError::Duplicate {
                path: "Event.title".into()
            }
        );
        assert_eq!(err.to_string(), "'Event.title' is declared more than once");
    }

    #[test]
    fn repeated_section_cannot_redeclare_a_key() {
        let err = Tree::from_sections([
            ("User", vec![("name", 1)]),
            ("User", vec![("name", 2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, TreeError::Duplicate { ref path } if path == "User.name"));
    }

    #[test]
    fn leaf_on_the_way_is_a_shape_mismatch() {
        let mut t = Tree::new();
        t.insert(&["Event"], 1).unwrap();
        let err = t.insert(&["Event", "title"], 2).unwrap_err();
        assert_eq!(
            err,
            TreeError::Shape(ShapeMismatch {
                path: "Event".into()
            })
        );
        assert_eq!(t.leaf(&["Event"]), Some(&1));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn leaf_over_a_mapping_is_a_shape_mismatch() {
        let mut t = Tree::new();
        t.insert(&["Event", "title"], 1).unwrap();
        let err = t.insert(&["Event"], 2).unwrap_err();
        assert!(matches!(err, TreeError::Shape(ref m) if m.path == "Event"));
        assert_eq!(t.leaf(&["Event", "title"]), Some(&1));
        assert_eq!(Tree::new().insert(&[], 0), Err(TreeError::EmptyPath));
    }

    #[test]
    fn map_leaves_keeps_shape() {
        let t = tree(&[("a.b.c", 2), ("a.d", 3)]);
        let doubled = t.map_leaves(|v| v * 2);
        assert_eq!(doubled.leaf(&["a", "b", "c"]), Some(&4));
        assert_eq!(doubled.leaf(&["a", "d"]), Some(&6));
    }

    #[test]
    fn merge_zero_trees_is_empty() {
        let merged = merge_with(Vec::<Tree<i32>>::new(), sum).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn single_occurrence_passes_through_without_combining() {
        let a = tree(&[("x.y", 1)]);
        let b = tree(&[("x.z", 2), ("w.v", 3)]);
        let mut calls = 0;
        let merged = merge_with([a, b], |v| {
            calls += 1;
            sum(v)
        })
        .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(merged.leaf(&["x", "y"]), Some(&1));
        assert_eq!(merged.leaf(&["x", "z"]), Some(&2));
        assert_eq!(merged.leaf(&["w", "v"]), Some(&3));
    }

    #[test]
    fn colliding_leaves_are_combined_in_input_order() {
        let a = tree(&[("x.y", 1)]);
        let b = tree(&[("x.y", 2)]);
        let c = tree(&[("x.y", 3)]);
        let merged = merge_with([a, b, c], |v| {
            assert_eq!(v, vec![1, 2, 3]);
            sum(v)
        })
        .unwrap();
        assert_eq!(merged.leaf(&["x", "y"]), Some(&6));
    }

    #[test]
    fn leaf_against_branch_is_a_shape_mismatch() {
        let a = tree(&[("Event.title", 1)]);
        let b = tree(&[("Event.title.nested", 2)]);
        let err = merge_with([a, b], sum).unwrap_err();
        assert_eq!(err.path, "Event.title");
        assert!(err.to_string().contains("Event.title"));
    }

    #[test]
    fn mismatch_is_detected_in_either_order() {
        let a = tree(&[("Event", 1)]);
        let b = tree(&[("Event.title", 2)]);
        assert!(merge_with([a.clone(), b.clone()], sum).is_err());
        assert!(merge_with([b, a], sum).is_err());
    }

    #[test]
    fn serialises_as_nested_objects() {
        let t = tree(&[("Query.events", 1)]);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v, serde_json::json!({ "Query": { "events": 1 } }));
    }
}
