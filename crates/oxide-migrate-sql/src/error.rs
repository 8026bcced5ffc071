//! Error types for SQL construct migrations.

use std::fmt;
use std::path::PathBuf;

use crate::item::ConstructKey;

/// Which end of a dependency declaration could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyRole {
    /// The construct that declared the dependency.
    Child,
    /// The construct being depended upon.
    Parent,
}

impl fmt::Display for DependencyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child => f.write_str("child"),
            Self::Parent => f.write_str("parent"),
        }
    }
}

/// Errors that can occur while building graphs or planning changes.
#[derive(Debug, thiserror::Error)]
pub enum MigrateSqlError {
    /// A construct key was registered twice within one snapshot.
    #[error("SQL construct {key} is declared more than once")]
    DuplicateKey {
        /// The duplicated key.
        key: ConstructKey,
    },

    /// A dependency declaration references a construct that doesn't exist.
    #[error("Namespace '{namespace}' dependencies reference nonexistent {role} node {key}")]
    MissingDependencyTarget {
        /// Namespace that issued the declaration.
        namespace: String,
        /// The key that could not be found.
        key: ConstructKey,
        /// Whether the missing key is the child or the parent.
        role: DependencyRole,
    },

    /// Traversal found a construct that (transitively) depends on itself.
    #[error("Circular dependency detected at {key}: {}", format_path(.path))]
    CyclicDependency {
        /// The key that was reached twice.
        key: ConstructKey,
        /// Traversal path ending in the repeated key.
        path: Vec<ConstructKey>,
    },

    /// A graph query was made for a key that isn't registered.
    #[error("SQL construct {key} is not part of this snapshot")]
    UnknownKey {
        /// The unknown key.
        key: ConstructKey,
    },

    /// IO error (reading declaration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A declaration file could be parsed but is not usable.
    #[error("Invalid declarations in '{path}': {message}")]
    InvalidDeclaration {
        /// Path to the declarations file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<MigrateSqlError>),
}

fn format_path(path: &[ConstructKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for SQL construct migrations.
pub type Result<T> = std::result::Result<T, MigrateSqlError>;
