//! Construct declarations grouped by namespace.
//!
//! Declarations are the input of a planning run: each namespace lists its
//! constructs in any order, and dependencies may point into other
//! namespaces. Files use JSON:
//!
//! ```json
//! {
//!   "namespaces": [
//!     {
//!       "namespace": "library",
//!       "items": [
//!         {
//!           "name": "top_books",
//!           "sql": [["CREATE FUNCTION top_books() ... WHERE rating > %s", [5]]],
//!           "reverse_sql": "DROP FUNCTION top_books()",
//!           "dependencies": [["sales", "top_sales"]]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateSqlError, Result};
use crate::graph::SqlStateGraph;
use crate::item::{ConstructKey, SqlItem};

/// Constructs declared by one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDeclarations {
    /// Namespace label.
    pub namespace: String,
    /// Declared constructs, in declaration order.
    #[serde(default)]
    pub items: Vec<SqlItem>,
}

/// Declarations of every namespace for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    /// Namespaces in declaration order.
    #[serde(default)]
    pub namespaces: Vec<NamespaceDeclarations>,
}

impl Declarations {
    /// Creates empty declarations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the constructs of a namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>, items: Vec<SqlItem>) -> Self {
        self.namespaces.push(NamespaceDeclarations {
            namespace: namespace.into(),
            items,
        });
        self
    }

    /// Parses declarations from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads declarations from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let declarations: Self =
            serde_json::from_str(&contents).map_err(|e| MigrateSqlError::InvalidDeclaration {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if let Some(ns) = declarations.namespaces.iter().find(|ns| ns.namespace.is_empty()) {
            return Err(MigrateSqlError::InvalidDeclaration {
                path: path.to_path_buf(),
                message: format!("namespace with {} item(s) has an empty label", ns.items.len()),
            });
        }

        debug!(
            path = %path.display(),
            namespaces = declarations.namespaces.len(),
            "Loaded SQL declarations"
        );
        Ok(declarations)
    }

    /// Total number of declared constructs.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.items.len()).sum()
    }

    /// Builds and resolves the snapshot graph.
    ///
    /// Every item is registered under `(namespace, name)` before any
    /// dependency is resolved, so items may be declared in any order.
    pub fn build_graph(&self) -> Result<SqlStateGraph> {
        let mut graph = SqlStateGraph::new();
        for ns in &self.namespaces {
            for item in &ns.items {
                let key = ConstructKey::new(ns.namespace.clone(), item.name.clone());
                graph.add_node(key.clone(), item.construct())?;
                for dep in &item.dependencies {
                    graph.add_dependency(ns.namespace.clone(), key.clone(), dep.clone());
                }
            }
        }
        graph.resolve()?;
        Ok(graph)
    }
}
