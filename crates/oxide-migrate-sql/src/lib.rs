//! Dependency-aware migrations for SQL constructs.
//!
//! `oxide-migrate-sql` plans how to move stored functions, views and
//! composite types from one declared state to another. Each construct is
//! declared with forward statements, reverse statements and the constructs
//! it depends on. Given a `from` and a `to` snapshot the planner works out
//! what was added, changed or removed, and emits teardown/rebuild steps in an
//! order that respects the dependencies:
//! - Changing a construct forces every construct that depends on it to be
//!   torn down and rebuilt, even if its own declaration is unchanged
//! - Teardown runs dependents first, rebuild runs foundations first
//! - Every step names the exact earlier steps it must wait for, so a host
//!   migration engine can interleave it with ordinary schema operations
//!
//! Statement text is never parsed or executed here.
//!
//! # Architecture
//!
//! - **Graph** - Constructs of one snapshot and their dependency edges
//! - **Diff** - Added, removed and changed keys between two snapshots
//! - **Order** - Change order with cascading invalidation
//! - **Autodetector** - Emits the plan steps and their dependency markers
//! - **Dependency** - Marker types and the checker hook for host schedulers
//! - **State** - Rebuilds a snapshot by replaying plan steps
//! - **Writer** - Renders plans as log lines or JSON
//!
//! # Example
//!
//! ```rust
//! use oxide_migrate_sql::prelude::*;
//!
//! let from = Declarations::new()
//!     .namespace(
//!         "library",
//!         vec![SqlItem::new("top_books", "CREATE VIEW top_books AS SELECT 1")
//!             .reverse("DROP VIEW top_books")],
//!     )
//!     .build_graph()?;
//! let to = Declarations::new()
//!     .namespace(
//!         "library",
//!         vec![SqlItem::new("top_books", "CREATE VIEW top_books AS SELECT 2")
//!             .reverse("DROP VIEW top_books")],
//!     )
//!     .build_graph()?;
//!
//! let plan = Autodetector::new().plan(&from, &to)?;
//! let actions: Vec<StepAction> = plan.iter().map(|step| step.action).collect();
//! assert_eq!(actions, vec![StepAction::ReverseAlter, StepAction::Alter]);
//! # Ok::<(), MigrateSqlError>(())
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the steps needed to go from one declarations file to another
//! oxide-migrate-sql plan --from old.json --to new.json
//!
//! # Same, as a JSON document
//! oxide-migrate-sql plan --from old.json --to new.json --format json
//!
//! # Validate a declarations file
//! oxide-migrate-sql check new.json
//! ```

pub mod autodetector;
pub mod declaration;
pub mod dependency;
pub mod diff;
pub mod error;
pub mod graph;
pub mod item;
pub mod order;
pub mod plan;
pub mod state;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::autodetector::{Autodetector, AutodetectorOptions};
    pub use crate::declaration::{Declarations, NamespaceDeclarations};
    pub use crate::dependency::{
        ConstructMarker, ConstructStepChecker, Dependency, DependencyChecker, HostOperation,
        SchemaChange, SchemaDependency, SchemaDependencyChecker, SchemaOperation,
    };
    pub use crate::diff::SnapshotDiff;
    pub use crate::error::{MigrateSqlError, Result};
    pub use crate::graph::{GraphNode, SqlStateGraph};
    pub use crate::item::{Construct, ConstructKey, SqlItem, SqlPayload, SqlStatement};
    pub use crate::order::{ChangeOrder, ChangeOrderer};
    pub use crate::plan::{Plan, PlanStep, PriorDefinition, StepAction, StepId};
    pub use crate::state::SqlState;
    pub use crate::writer::PlanWriter;
}

/// Constructs declared in Rust code by a namespace.
///
/// Implemented by application modules that own SQL constructs.
pub trait CustomSql {
    /// Namespace label (e.g., "library", "sales").
    const NAMESPACE: &'static str;

    /// Returns the declared constructs.
    fn custom_sql() -> Vec<item::SqlItem>;

    /// Converts to namespace declarations.
    fn declarations() -> declaration::NamespaceDeclarations {
        declaration::NamespaceDeclarations {
            namespace: Self::NAMESPACE.to_string(),
            items: Self::custom_sql(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    struct Library;

    impl CustomSql for Library {
        const NAMESPACE: &'static str = "library";

        fn custom_sql() -> Vec<SqlItem> {
            vec![SqlItem::new("top_books", "CREATE VIEW top_books AS SELECT 1")
                .reverse("DROP VIEW top_books")]
        }
    }

    #[test]
    fn test_custom_sql_trait() {
        assert_eq!(Library::NAMESPACE, "library");
        assert_eq!(Library::custom_sql().len(), 1);
    }

    #[test]
    fn test_declarations() {
        let declarations = Declarations {
            namespaces: vec![Library::declarations()],
        };
        let graph = declarations.build_graph().unwrap();
        assert!(graph.contains(&ConstructKey::new("library", "top_books")));
    }
}
