//! Namespace tree over a flat key space.
//!
//! Keys are grouped one level at a time: for a prefix such as `user:*` and
//! delimiter `:`, the key `user:1:name` shows up as the branch `1` and the
//! key `user:2` as the leaf `2`.

use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use crate::keys::{execute, open};
use crate::{Command, Connector, Result};

/// One child of a namespace level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NamespaceNode {
    /// Segment of the key below the searched prefix.
    pub name: String,
    /// Full key name; only leaves carry one.
    pub key: Option<String>,
    pub has_children: bool,
}

/// Groups `keys` found under `prefix` into the children of that level.
///
/// `prefix` is the searched pattern; everything before its trailing `*` is
/// stripped from each key. Nodes are deduplicated by name and kind, so a name
/// that is both a key and the parent of other keys yields a leaf and a branch.
/// The order of the result is unspecified.
pub fn build_children<S: AsRef<str>>(keys: &[S], prefix: &str, delimiter: &str) -> Vec<NamespaceNode> {
    let searched = prefix.strip_suffix('*').unwrap_or(prefix);
    let mut nodes: HashMap<String, NamespaceNode> = HashMap::new();

    for key in keys {
        let key = key.as_ref();
        let relative = key.strip_prefix(searched).unwrap_or(key);
        let split = if delimiter.is_empty() {
            None
        } else {
            relative.find(delimiter)
        };
        match split {
            Some(pos) => {
                let name = &relative[..pos];
                nodes
                    .entry(format!("{}{}", name, delimiter))
                    .or_insert_with(|| NamespaceNode {
                        name: name.to_string(),
                        key: None,
                        has_children: true,
                    });
            }
            None => {
                nodes
                    .entry(relative.to_string())
                    .or_insert_with(|| NamespaceNode {
                        name: relative.to_string(),
                        key: Some(key.to_string()),
                        has_children: false,
                    });
            }
        }
    }

    nodes.into_values().collect()
}

/// One page of a namespace level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeysSubtree {
    /// Children sorted by name, leaves before branches of the same name.
    pub nodes: Vec<NamespaceNode>,
    /// Segments of the browsed prefix; empty at the root.
    pub path: Vec<String>,
    /// Number of keys under the prefix.
    pub keys_count: usize,
}

/// Lists the children of the level addressed by `prefix` (`*` for the root,
/// `user:*` one level down), returning at most `limit` nodes after `offset`.
#[allow(clippy::too_many_arguments)]
pub async fn find_tree_children(
    connector: &dyn Connector,
    server: &str,
    db: u8,
    prefix: &str,
    delimiter: &str,
    offset: usize,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<KeysSubtree> {
    let mut session = open(connector, server, db, cancel).await?;
    let keys = execute(session.as_mut(), Command::new("KEYS").arg(prefix), cancel)
        .await?
        .into_strings()?;

    let mut nodes = build_children(&keys, prefix, delimiter);
    nodes.sort_by(|a, b| a.name.cmp(&b.name).then(a.has_children.cmp(&b.has_children)));
    let nodes = nodes.into_iter().skip(offset).take(limit).collect();

    Ok(KeysSubtree {
        nodes,
        path: prefix_path(prefix, delimiter),
        keys_count: keys.len(),
    })
}

fn prefix_path(prefix: &str, delimiter: &str) -> Vec<String> {
    let searched = prefix.strip_suffix('*').unwrap_or(prefix);
    let searched = searched.strip_suffix(delimiter).unwrap_or(searched);
    if searched.is_empty() || delimiter.is_empty() {
        return if searched.is_empty() {
            Vec::new()
        } else {
            vec![searched.to_string()]
        };
    }
    searched.split(delimiter).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::testing::*;

    fn sorted(mut nodes: Vec<NamespaceNode>) -> Vec<(String, bool)> {
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then(a.has_children.cmp(&b.has_children)));
        nodes.into_iter().map(|n| (n.name, n.has_children)).collect()
    }

    fn expect(items: &[(&str, bool)]) -> Vec<(String, bool)> {
        items.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn test_flat_keys_are_leaves() {
        let nodes = build_children(&["a", "b", "c", "d", "e"], "*", ":");
        assert_eq!(nodes.len(), 5);
        assert!(nodes.iter().all(|n| !n.has_children && n.key.as_deref() == Some(n.name.as_str())));
    }

    #[test]
    fn test_branches_and_leaves() {
        let nodes = build_children(&["a:c", "b", "d:r:f"], "*", ":");
        assert_eq!(sorted(nodes.clone()), expect(&[("a", true), ("b", false), ("d", true)]));
        let a = nodes.iter().find(|n| n.name == "a").unwrap();
        assert_eq!(a.key, None);
        let b = nodes.iter().find(|n| n.name == "b").unwrap();
        assert_eq!(b.key.as_deref(), Some("b"));
    }

    #[test]
    fn test_nested_prefix() {
        let nodes = build_children(&["d:r:f", "d:r:e"], "d:*", ":");
        assert_eq!(sorted(nodes), expect(&[("r", true)]));

        let nodes = build_children(&["d:r:f", "d:r:e"], "d:r:*", ":");
        assert_eq!(sorted(nodes.clone()), expect(&[("e", false), ("f", false)]));
        let f = nodes.iter().find(|n| n.name == "f").unwrap();
        assert_eq!(f.key.as_deref(), Some("d:r:f"));
    }

    #[test]
    fn test_leaf_and_branch_with_same_name() {
        let nodes = build_children(&["a", "a:b", "a:c"], "*", ":");
        assert_eq!(sorted(nodes), expect(&[("a", false), ("a", true)]));
    }

    #[test]
    fn test_multi_char_delimiter() {
        let nodes = build_children(&["x::y", "x::z", "w"], "*", "::");
        assert_eq!(sorted(nodes), expect(&[("w", false), ("x", true)]));
    }

    #[test]
    fn test_prefix_path() {
        assert!(prefix_path("*", ":").is_empty());
        assert_eq!(prefix_path("d:r:*", ":"), vec!["d", "r"]);
        assert_eq!(prefix_path("user:*", ":"), vec!["user"]);
    }

    #[tokio::test]
    async fn test_find_tree_children_pages() {
        let store = store();
        seed(
            &store,
            vec![
                Command::new("SET").arg("user:1:name").arg("x"),
                Command::new("SET").arg("user:1:mail").arg("x"),
                Command::new("SET").arg("user:2").arg("x"),
                Command::new("SET").arg("user:3").arg("x"),
                Command::new("SET").arg("session").arg("x"),
            ],
        )
        .await;
        let cancel = CancellationToken::new();

        let root = find_tree_children(store.as_ref(), SERVER, 0, "*", ":", 0, 100, &cancel)
            .await
            .unwrap();
        assert_eq!(root.keys_count, 5);
        assert!(root.path.is_empty());
        let names: Vec<_> = root.nodes.iter().map(|n| (n.name.as_str(), n.has_children)).collect();
        assert_eq!(names, vec![("session", false), ("user", true)]);

        let users = find_tree_children(store.as_ref(), SERVER, 0, "user:*", ":", 1, 2, &cancel)
            .await
            .unwrap();
        assert_eq!(users.keys_count, 4);
        assert_eq!(users.path, vec!["user"]);
        let names: Vec<_> = users.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["2", "3"]);
    }
}
