//! Cross-step dependency markers and the checkers that resolve them.
//!
//! A host migration engine schedules its operations from a set of
//! dependencies per operation, asking a [`DependencyChecker`] whether a given
//! operation satisfies a given dependency. Ordinary schema dependencies are
//! matched by table and column. Construct markers point at one exact prior
//! step and are only satisfied by that step.

use serde::{Deserialize, Serialize};

use crate::item::ConstructKey;
use crate::plan::{PlanStep, StepId};

/// "Run after the latest step touching `namespace.name`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructMarker {
    /// Namespace of the referenced construct.
    pub namespace: String,
    /// Name of the referenced construct.
    pub name: String,
    /// The step to wait for; `None` if no step touched the construct yet.
    pub step: Option<StepId>,
}

impl ConstructMarker {
    /// Creates a marker for `key` pointing at `step`.
    #[must_use]
    pub fn new(key: &ConstructKey, step: Option<StepId>) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            step,
        }
    }

    /// Key of the referenced construct.
    #[must_use]
    pub fn key(&self) -> ConstructKey {
        ConstructKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Kind of schema change a host dependency waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChange {
    /// The table (or column) has been created.
    Created,
    /// The table (or column) has been altered.
    Altered,
    /// The table (or column) has been removed.
    Removed,
}

/// An ordinary host dependency on a table or column change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDependency {
    /// Owning namespace of the table.
    pub namespace: String,
    /// Table name.
    pub table: String,
    /// Column name, or `None` for the table itself.
    pub column: Option<String>,
    /// Change being waited for.
    pub change: SchemaChange,
}

impl SchemaDependency {
    /// Waits for `table` to be created.
    #[must_use]
    pub fn table_created(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
            column: None,
            change: SchemaChange::Created,
        }
    }

    /// Waits for `column` of `table` to change as described.
    #[must_use]
    pub fn column(
        namespace: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        change: SchemaChange,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
            column: Some(column.into()),
            change,
        }
    }
}

/// Any dependency a plan step may carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    /// Wait for an exact construct step.
    Construct(ConstructMarker),
    /// Host schema dependency, passed through unchanged.
    Schema(SchemaDependency),
}

/// A table or column operation scheduled by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOperation {
    /// Owning namespace of the table.
    pub namespace: String,
    /// Table name.
    pub table: String,
    /// Column name, or `None` for table-level operations.
    pub column: Option<String>,
    /// What the operation does.
    pub change: SchemaChange,
}

/// Anything a host migration can contain.
#[derive(Debug, Clone, Copy)]
pub enum HostOperation<'a> {
    /// A table or column operation.
    Schema(&'a SchemaOperation),
    /// A construct step from a [`Plan`](crate::plan::Plan).
    Construct(&'a PlanStep),
}

/// Decides whether an operation satisfies a dependency.
pub trait DependencyChecker {
    /// Returns true if `operation` satisfies `dependency`.
    fn is_satisfied(&self, operation: HostOperation<'_>, dependency: &Dependency) -> bool;

    /// Positions of the operations in `operations` that satisfy `dependency`.
    fn satisfied_by(
        &self,
        operations: &[HostOperation<'_>],
        dependency: &Dependency,
    ) -> Vec<usize> {
        operations
            .iter()
            .enumerate()
            .filter(|(_, operation)| self.is_satisfied(**operation, dependency))
            .map(|(pos, _)| pos)
            .collect()
    }
}

/// The host's generic rule: schema dependencies match schema operations on
/// the same table, column and change. Knows nothing about constructs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDependencyChecker;

impl DependencyChecker for SchemaDependencyChecker {
    fn is_satisfied(&self, operation: HostOperation<'_>, dependency: &Dependency) -> bool {
        match (operation, dependency) {
            (HostOperation::Schema(op), Dependency::Schema(dep)) => {
                op.namespace == dep.namespace
                    && op.table == dep.table
                    && op.column == dep.column
                    && op.change == dep.change
            }
            _ => false,
        }
    }
}

/// Resolves construct markers by step identity and hands every other
/// dependency to `fallback`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructStepChecker<C = SchemaDependencyChecker> {
    fallback: C,
}

impl<C: DependencyChecker> ConstructStepChecker<C> {
    /// Chains construct marker resolution in front of `fallback`.
    pub const fn new(fallback: C) -> Self {
        Self { fallback }
    }
}

impl<C: DependencyChecker> DependencyChecker for ConstructStepChecker<C> {
    fn is_satisfied(&self, operation: HostOperation<'_>, dependency: &Dependency) -> bool {
        match dependency {
            Dependency::Construct(marker) => match operation {
                HostOperation::Construct(step) => marker.step == Some(step.id),
                HostOperation::Schema(_) => false,
            },
            Dependency::Schema(_) => self.fallback.is_satisfied(operation, dependency),
        }
    }
}
