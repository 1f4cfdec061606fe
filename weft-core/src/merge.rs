//! Deep merge over a tagged value tree
//!
//! Resolver tables are merged service by service with three rules:
//!
//! - list + list: concatenate, earlier entries first
//! - map + map: merge key by key with these same rules
//! - anything else: the incoming value replaces the existing one
//!
//! The merge is order sensitive and not commutative. Services merged later
//! win every leaf conflict, which makes the registry listing order the
//! precedence order.

use indexmap::IndexMap;

/// A value in a mergeable tree
#[derive(Debug, Clone, PartialEq)]
pub enum Tree<T> {
    Leaf(T),
    List(Vec<Tree<T>>),
    Map(IndexMap<String, Tree<T>>),
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Tree::Map(IndexMap::new())
    }
}

impl<T> Tree<T> {
    pub fn map() -> Self {
        Tree::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Tree<T>>> {
        match self {
            Tree::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Tree::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Follow a key path through nested maps
    pub fn get_path(&self, path: &[&str]) -> Option<&Tree<T>> {
        let mut node = self;
        for key in path {
            node = node.as_map()?.get(*key)?;
        }
        Some(node)
    }

    /// Insert `value` at `path`, creating intermediate maps and replacing
    /// anything in the way.
    pub fn insert_path(&mut self, path: &[&str], value: Tree<T>) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };

        let mut node = self;
        for key in parents {
            node = node
                .ensure_map()
                .entry((*key).to_string())
                .or_insert_with(Tree::map);
        }
        node.ensure_map().insert((*last).to_string(), value);
    }

    fn ensure_map(&mut self) -> &mut IndexMap<String, Tree<T>> {
        if !matches!(self, Tree::Map(_)) {
            *self = Tree::map();
        }
        match self {
            Tree::Map(m) => m,
            _ => unreachable!("node was just replaced by a map"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Tree::Leaf(_) => false,
            Tree::List(l) => l.is_empty(),
            Tree::Map(m) => m.is_empty(),
        }
    }

    /// All leaves with their key paths, depth first in insertion order.
    /// List elements are addressed by index.
    pub fn leaves(&self) -> Vec<(Vec<String>, &T)> {
        let mut out = Vec::new();
        collect_leaves(self, &mut Vec::new(), &mut out);
        out
    }
}

fn collect_leaves<'a, T>(
    node: &'a Tree<T>,
    path: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, &'a T)>,
) {
    match node {
        Tree::Leaf(v) => out.push((path.clone(), v)),
        Tree::List(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                collect_leaves(item, path, out);
                path.pop();
            }
        }
        Tree::Map(m) => {
            for (key, child) in m {
                path.push(key.clone());
                collect_leaves(child, path, out);
                path.pop();
            }
        }
    }
}

/// An existing value that was replaced during a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub path: Vec<String>,
}

impl Override {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Merge `incoming` into `base`
pub fn merge<T>(base: Tree<T>, incoming: Tree<T>) -> Tree<T> {
    let mut overrides = Vec::new();
    merge_reporting(base, incoming, &mut overrides)
}

/// Merge `incoming` into `base`, recording every replaced value
pub fn merge_reporting<T>(
    base: Tree<T>,
    incoming: Tree<T>,
    overrides: &mut Vec<Override>,
) -> Tree<T> {
    merge_at(base, incoming, &mut Vec::new(), overrides)
}

fn merge_at<T>(
    base: Tree<T>,
    incoming: Tree<T>,
    path: &mut Vec<String>,
    overrides: &mut Vec<Override>,
) -> Tree<T> {
    match (base, incoming) {
        (Tree::List(mut a), Tree::List(b)) => {
            a.extend(b);
            Tree::List(a)
        }
        (Tree::Map(mut a), Tree::Map(b)) => {
            for (key, value) in b {
                match a.get_mut(&key) {
                    Some(slot) => {
                        let existing = std::mem::take(slot);
                        path.push(key);
                        *slot = merge_at(existing, value, path, overrides);
                        path.pop();
                    }
                    None => {
                        a.insert(key, value);
                    }
                }
            }
            Tree::Map(a)
        }
        (_, incoming) => {
            overrides.push(Override { path: path.clone() });
            incoming
        }
    }
}
