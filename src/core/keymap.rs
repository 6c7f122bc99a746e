//! Delimiter-based key nesting
//!
//! `DATABASE__HOST=db` with delimiter `__` becomes the path
//! `DATABASE -> HOST` in a [`ConfigTree`]. [`flatten`] is the inverse, so
//! `flatten(&unflatten(m, d)?, d) == m` for every mapping without path
//! collisions.

use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Default nesting delimiter
pub const DEFAULT_DELIMITER: &str = "__";

/// Nested configuration values, leaves still uncoerced strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigTree {
    Leaf(String),
    Branch(BTreeMap<String, ConfigTree>),
}

impl Default for ConfigTree {
    fn default() -> Self {
        ConfigTree::Branch(BTreeMap::new())
    }
}

impl ConfigTree {
    /// Follows a path of segments
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&ConfigTree> {
        path.iter().try_fold(self, |node, segment| match node {
            ConfigTree::Branch(children) => children.get(segment.as_ref()),
            ConfigTree::Leaf(_) => None,
        })
    }

    /// Leaf value at a path, if the path ends on a leaf
    pub fn leaf<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        match self.get_path(path)? {
            ConfigTree::Leaf(value) => Some(value),
            ConfigTree::Branch(_) => None,
        }
    }

    /// Visits every leaf with its path, depth first in key order
    pub fn for_each_leaf<F>(&self, mut visit: F)
    where
        F: FnMut(&[String], &str),
    {
        fn walk<F: FnMut(&[String], &str)>(node: &ConfigTree, path: &mut Vec<String>, visit: &mut F) {
            match node {
                ConfigTree::Leaf(value) => visit(path.as_slice(), value.as_str()),
                ConfigTree::Branch(children) => {
                    for (segment, child) in children {
                        path.push(segment.clone());
                        walk(child, path, visit);
                        path.pop();
                    }
                }
            }
        }
        walk(self, &mut Vec::new(), &mut visit);
    }
}

/// Splits a flat key into its path segments
///
/// # Errors
///
/// Returns [`StrataError::KeyMapping`] for an empty delimiter or a key with an
/// empty segment (leading, trailing or doubled delimiter).
pub fn split_key<'k>(key: &'k str, delimiter: &str) -> Result<Vec<&'k str>> {
    if delimiter.is_empty() {
        return Err(StrataError::KeyMapping(
            "nesting delimiter cannot be empty".to_string(),
        ));
    }
    let segments: Vec<&str> = key.split(delimiter).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(StrataError::KeyMapping(format!(
            "key '{key}' has an empty segment for delimiter '{delimiter}'"
        )));
    }
    Ok(segments)
}

/// Builds a tree from flat keys
///
/// # Errors
///
/// Returns [`StrataError::KeyMapping`] when one key is both a leaf and the
/// prefix of another (e.g. `DB` and `DB__HOST`), or a key is malformed.
pub fn unflatten(flat: &BTreeMap<String, String>, delimiter: &str) -> Result<ConfigTree> {
    let mut root = BTreeMap::new();

    for (key, value) in flat {
        let segments = split_key(key, delimiter)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| StrataError::KeyMapping("empty key".to_string()))?;

        let mut node = &mut root;
        for (depth, segment) in parents.iter().enumerate() {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| ConfigTree::Branch(BTreeMap::new()));
            node = match child {
                ConfigTree::Branch(children) => children,
                ConfigTree::Leaf(_) => {
                    return Err(collision(&segments[..=depth].join(delimiter), key));
                }
            };
        }

        if node.contains_key(*leaf) {
            return Err(collision(key, key));
        }
        node.insert(leaf.to_string(), ConfigTree::Leaf(value.clone()));
    }

    Ok(ConfigTree::Branch(root))
}

fn collision(prefix: &str, key: &str) -> StrataError {
    StrataError::KeyMapping(format!(
        "key '{key}' collides with '{prefix}', which is both a value and a section"
    ))
}

/// Flattens a tree back into delimiter-joined keys
pub fn flatten(tree: &ConfigTree, delimiter: &str) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    tree.for_each_leaf(|path, value| {
        flat.insert(path.join(delimiter), value.to_string());
    });
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unflatten_nests_on_delimiter() {
        let tree = unflatten(
            &flat(&[
                ("DATABASE__HOST", "db"),
                ("DATABASE__PORT", "5432"),
                ("DEBUG", "true"),
            ]),
            DEFAULT_DELIMITER,
        )
        .unwrap();

        assert_eq!(tree.leaf(&["DATABASE", "HOST"]), Some("db"));
        assert_eq!(tree.leaf(&["DATABASE", "PORT"]), Some("5432"));
        assert_eq!(tree.leaf(&["DEBUG"]), Some("true"));
        assert_eq!(tree.leaf(&["DATABASE"]), None);
    }

    #[test]
    fn test_deep_nesting() {
        let tree = unflatten(&flat(&[("A__B__C__D", "x")]), "__").unwrap();
        assert_eq!(tree.leaf(&["A", "B", "C", "D"]), Some("x"));
    }

    #[test]
    fn test_single_underscore_is_not_a_delimiter() {
        let tree = unflatten(&flat(&[("DATABASE_URL", "x")]), "__").unwrap();
        assert_eq!(tree.leaf(&["DATABASE_URL"]), Some("x"));
    }

    #[test]
    fn test_round_trip_identity() {
        let m = flat(&[
            ("APP__NAME", "demo"),
            ("APP__LIMITS__MAX", "10"),
            ("APP__LIMITS__MIN", "1"),
            ("PLAIN", "v"),
        ]);
        let tree = unflatten(&m, "__").unwrap();
        assert_eq!(flatten(&tree, "__"), m);
    }

    #[test]
    fn test_round_trip_custom_delimiter() {
        let m = flat(&[("A.B", "1"), ("A.C", "2")]);
        let tree = unflatten(&m, ".").unwrap();
        assert_eq!(flatten(&tree, "."), m);
    }

    #[test]
    fn test_leaf_and_section_collision() {
        let result = unflatten(&flat(&[("DB", "x"), ("DB__HOST", "y")]), "__");
        assert!(matches!(result, Err(StrataError::KeyMapping(_))));
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(unflatten(&flat(&[("A____B", "x")]), "__").is_err());
        assert!(unflatten(&flat(&[("A__", "x")]), "__").is_err());
        assert!(unflatten(&flat(&[("__A", "x")]), "__").is_err());
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert!(split_key("A", "").is_err());
    }

    #[test]
    fn test_tree_serializes_as_nested_object() {
        let tree = unflatten(&flat(&[("A__B", "1")]), "__").unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({"A": {"B": "1"}}));
    }
}
