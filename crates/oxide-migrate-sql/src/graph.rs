//! Dependency graph of SQL constructs for one snapshot.
//!
//! Constructs are registered first and dependencies are resolved afterwards,
//! because declaration order doesn't have to follow dependency order. A graph
//! is built once per planning run and treated as read-only afterwards.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{DependencyRole, MigrateSqlError, Result};
use crate::item::{Construct, ConstructKey};

/// Structural view of one construct: its parents and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// The construct this node belongs to.
    pub key: ConstructKey,
    /// Constructs this one requires.
    pub parents: BTreeSet<ConstructKey>,
    /// Constructs that require this one.
    pub children: BTreeSet<ConstructKey>,
}

impl GraphNode {
    fn new(key: ConstructKey) -> Self {
        Self {
            key,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }
}

/// A dependency declaration waiting for [`SqlStateGraph::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyDependency {
    /// Namespace that issued the declaration.
    pub namespace: String,
    /// The dependent construct.
    pub child: ConstructKey,
    /// The construct that must exist first.
    pub parent: ConstructKey,
}

/// Constructs of one snapshot plus their dependency edges.
#[derive(Debug, Clone, Default)]
pub struct SqlStateGraph {
    order: Vec<ConstructKey>,
    nodes: HashMap<ConstructKey, Construct>,
    node_map: HashMap<ConstructKey, GraphNode>,
    dependencies: Vec<LazyDependency>,
}

impl SqlStateGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a construct.
    ///
    /// Fails with [`MigrateSqlError::DuplicateKey`] if the key is already present.
    pub fn add_node(&mut self, key: ConstructKey, construct: Construct) -> Result<()> {
        if self.nodes.contains_key(&key) {
            return Err(MigrateSqlError::DuplicateKey { key });
        }
        debug!(key = %key, "Registering SQL construct");
        self.order.push(key.clone());
        self.node_map.insert(key.clone(), GraphNode::new(key.clone()));
        self.nodes.insert(key, construct);
        Ok(())
    }

    /// Registers a construct, replacing the payload if the key already exists.
    ///
    /// Existing edges are kept until the next [`resolve`](Self::resolve).
    pub fn replace_node(&mut self, key: ConstructKey, construct: Construct) {
        if let Some(existing) = self.nodes.get_mut(&key) {
            *existing = construct;
        } else {
            self.order.push(key.clone());
            self.node_map.insert(key.clone(), GraphNode::new(key.clone()));
            self.nodes.insert(key, construct);
        }
    }

    /// Removes a construct and every edge touching it.
    ///
    /// Pending dependency declarations are left alone; see
    /// [`remove_dependencies`](Self::remove_dependencies).
    pub fn remove_node(&mut self, key: &ConstructKey) {
        if self.nodes.remove(key).is_none() {
            warn!(key = %key, "Removing SQL construct that isn't registered");
            return;
        }
        self.order.retain(|k| k != key);
        self.node_map.remove(key);
        for node in self.node_map.values_mut() {
            node.parents.remove(key);
            node.children.remove(key);
        }
    }

    /// Records that `child` requires `parent`. Validated by [`resolve`](Self::resolve).
    pub fn add_dependency(
        &mut self,
        namespace: impl Into<String>,
        child: ConstructKey,
        parent: ConstructKey,
    ) {
        self.dependencies.push(LazyDependency {
            namespace: namespace.into(),
            child,
            parent,
        });
    }

    /// Drops every pending declaration `namespace` made for `child`.
    pub fn remove_dependencies(&mut self, namespace: &str, child: &ConstructKey) {
        self.dependencies
            .retain(|dep| !(dep.namespace == namespace && &dep.child == child));
    }

    /// Links parents and children for every pending declaration.
    ///
    /// Edges are rebuilt from scratch, so calling this again after more
    /// changes gives the same result as calling it once.
    ///
    /// Every declaration is checked before any edge changes, so on error
    /// the graph keeps its previous edges.
    pub fn resolve(&mut self) -> Result<()> {
        for dep in &self.dependencies {
            if !self.nodes.contains_key(&dep.child) {
                return Err(MigrateSqlError::MissingDependencyTarget {
                    namespace: dep.namespace.clone(),
                    key: dep.child.clone(),
                    role: DependencyRole::Child,
                });
            }
            if !self.nodes.contains_key(&dep.parent) {
                return Err(MigrateSqlError::MissingDependencyTarget {
                    namespace: dep.namespace.clone(),
                    key: dep.parent.clone(),
                    role: DependencyRole::Parent,
                });
            }
        }

        for node in self.node_map.values_mut() {
            node.parents.clear();
            node.children.clear();
        }
        for dep in &self.dependencies {
            if let Some(child) = self.node_map.get_mut(&dep.child) {
                child.parents.insert(dep.parent.clone());
            }
            if let Some(parent) = self.node_map.get_mut(&dep.parent) {
                parent.children.insert(dep.child.clone());
            }
        }

        debug!(
            nodes = self.nodes.len(),
            edges = self.edge_count(),
            "Resolved SQL construct dependencies"
        );
        Ok(())
    }

    /// Returns the construct registered under `key`.
    #[must_use]
    pub fn get(&self, key: &ConstructKey) -> Option<&Construct> {
        self.nodes.get(key)
    }

    /// Returns the structural node of `key`.
    #[must_use]
    pub fn node(&self, key: &ConstructKey) -> Option<&GraphNode> {
        self.node_map.get(key)
    }

    /// Returns true if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &ConstructKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Iterates over keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &ConstructKey> {
        self.order.iter()
    }

    /// Number of registered constructs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no construct is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of resolved parent/child edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.node_map.values().map(|node| node.parents.len()).sum()
    }

    /// Pending dependency declarations.
    #[must_use]
    pub fn dependencies(&self) -> &[LazyDependency] {
        &self.dependencies
    }

    /// Direct parents of `key` (empty if unknown).
    pub fn parents(&self, key: &ConstructKey) -> impl Iterator<Item = &ConstructKey> {
        self.node_map
            .get(key)
            .into_iter()
            .flat_map(|node| node.parents.iter())
    }

    /// Direct children of `key` (empty if unknown).
    pub fn children(&self, key: &ConstructKey) -> impl Iterator<Item = &ConstructKey> {
        self.node_map
            .get(key)
            .into_iter()
            .flat_map(|node| node.children.iter())
    }

    /// All keys reachable through parent edges, most distant first and
    /// `key` itself last.
    ///
    /// Every key appears after all of its own ancestors.
    pub fn ancestors(&self, key: &ConstructKey) -> Result<Vec<ConstructKey>> {
        self.walk(key, |node| &node.parents)
    }

    /// All keys reachable through child edges, `key` itself first and the
    /// most distant dependent last.
    ///
    /// Every key appears before all of its own dependents.
    pub fn descendants(&self, key: &ConstructKey) -> Result<Vec<ConstructKey>> {
        let mut keys = self.walk(key, |node| &node.children)?;
        keys.reverse();
        Ok(keys)
    }

    /// Fails with [`MigrateSqlError::CyclicDependency`] if any construct
    /// depends on itself.
    pub fn check_acyclic(&self) -> Result<()> {
        for key in &self.order {
            self.ancestors(key)?;
        }
        Ok(())
    }

    /// Depth-first post-order walk along the edges chosen by `edges`.
    fn walk<'a, F>(&'a self, start: &ConstructKey, edges: F) -> Result<Vec<ConstructKey>>
    where
        F: Fn(&'a GraphNode) -> &'a BTreeSet<ConstructKey> + Copy,
    {
        if !self.node_map.contains_key(start) {
            return Err(MigrateSqlError::UnknownKey { key: start.clone() });
        }
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut result = Vec::new();
        self.visit(start, edges, &mut visited, &mut path, &mut result)?;
        Ok(result)
    }

    fn visit<'a, F>(
        &'a self,
        key: &ConstructKey,
        edges: F,
        visited: &mut HashSet<ConstructKey>,
        path: &mut Vec<ConstructKey>,
        result: &mut Vec<ConstructKey>,
    ) -> Result<()>
    where
        F: Fn(&'a GraphNode) -> &'a BTreeSet<ConstructKey> + Copy,
    {
        path.push(key.clone());
        if let Some(node) = self.node_map.get(key) {
            for next in edges(node) {
                if path.contains(next) {
                    let mut cycle = path.clone();
                    cycle.push(next.clone());
                    return Err(MigrateSqlError::CyclicDependency {
                        key: next.clone(),
                        path: cycle,
                    });
                }
                if !visited.contains(next) {
                    self.visit(next, edges, visited, path, result)?;
                }
            }
        }
        path.pop();
        visited.insert(key.clone());
        result.push(key.clone());
        Ok(())
    }
}
