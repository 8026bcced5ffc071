//! State reconstruction from plan steps.
//!
//! This module rebuilds a construct snapshot by replaying steps, the way a
//! host rebuilds the `from` snapshot out of previously written migrations.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::graph::SqlStateGraph;
use crate::item::{Construct, ConstructKey};
use crate::plan::{Plan, PlanStep, StepAction};

/// Reconstructs a construct snapshot from plan steps.
#[derive(Debug, Clone, Default)]
pub struct SqlState {
    graph: SqlStateGraph,
}

impl SqlState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing snapshot.
    #[must_use]
    pub const fn from_graph(graph: SqlStateGraph) -> Self {
        Self { graph }
    }

    /// Returns the current (possibly unresolved) graph.
    #[must_use]
    pub const fn graph(&self) -> &SqlStateGraph {
        &self.graph
    }

    /// Resolves dependencies and returns the graph.
    pub fn into_graph(mut self) -> Result<SqlStateGraph> {
        self.graph.resolve()?;
        Ok(self.graph)
    }

    /// Applies a single step.
    pub fn apply_step(&mut self, step: &PlanStep) {
        match step.action {
            StepAction::Create | StepAction::Alter => {
                let construct = Construct::new(step.sql.clone(), step.reverse_sql.clone());
                self.put(&step.key, construct, &step.construct_dependencies);
            }
            // The following Alter replaces the construct.
            StepAction::ReverseAlter => {}
            StepAction::Delete => self.remove(&step.key),
        }
    }

    /// Unapplies a single step.
    pub fn unapply_step(&mut self, step: &PlanStep) {
        match step.action {
            StepAction::Create => self.remove(&step.key),
            // Otherwise restored by unapplying the preceding ReverseAlter.
            StepAction::Alter => {
                if let Some(prior) = &step.prior {
                    self.put(
                        &step.key,
                        prior.construct.clone(),
                        &prior.construct_dependencies,
                    );
                }
            }
            StepAction::ReverseAlter | StepAction::Delete => {
                if let Some(sql) = step.reverse_sql.clone() {
                    let construct = Construct::new(sql, Some(step.sql.clone()));
                    self.put(&step.key, construct, &step.construct_dependencies);
                }
            }
        }
    }

    /// Applies every step of `plan` in emission order.
    pub fn apply_plan(&mut self, plan: &Plan) {
        for step in plan.iter() {
            self.apply_step(step);
        }
        debug!(steps = plan.len(), "Replayed SQL construct steps");
    }

    /// Unapplies every step of `plan` in reverse emission order.
    pub fn unapply_plan(&mut self, plan: &Plan) {
        for step in plan.iter().rev() {
            self.unapply_step(step);
        }
        debug!(steps = plan.len(), "Rolled back SQL construct steps");
    }

    fn put(
        &mut self,
        key: &ConstructKey,
        construct: Construct,
        parents: &BTreeSet<ConstructKey>,
    ) {
        self.graph.replace_node(key.clone(), construct);
        self.graph.remove_dependencies(&key.namespace, key);
        for parent in parents {
            self.graph
                .add_dependency(key.namespace.clone(), key.clone(), parent.clone());
        }
    }

    fn remove(&mut self, key: &ConstructKey) {
        self.graph.remove_node(key);
        self.graph.remove_dependencies(&key.namespace, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodetector::Autodetector;
    use crate::item::SqlItem;

    fn graph(items: &[SqlItem]) -> SqlStateGraph {
        let mut graph = SqlStateGraph::new();
        for item in items {
            let key = ConstructKey::new("library", item.name.clone());
            graph.add_node(key.clone(), item.construct()).unwrap();
            for dep in &item.dependencies {
                graph.add_dependency("library", key.clone(), dep.clone());
            }
        }
        graph.resolve().unwrap();
        graph
    }

    fn item(name: &str, version: u32) -> SqlItem {
        SqlItem::new(name, format!("CREATE TYPE {name} AS (a int); -- {version}"))
            .reverse(format!("DROP TYPE {name}"))
    }

    fn assert_same(actual: &SqlStateGraph, expected: &SqlStateGraph) {
        assert_eq!(actual.len(), expected.len());
        for key in expected.keys() {
            assert_eq!(actual.get(key), expected.get(key), "payload of {key}");
            assert_eq!(
                actual.node(key).map(|n| &n.parents),
                expected.node(key).map(|n| &n.parents),
                "parents of {key}"
            );
        }
    }

    fn snapshots() -> (SqlStateGraph, SqlStateGraph) {
        let from = graph(&[
            item("top_ratings", 1),
            item("top_sales", 1),
            item("top_books", 1).depends_on("library", "top_ratings"),
            item("top_narrations", 1).depends_on("library", "top_books"),
        ]);
        let to = graph(&[
            item("top_ratings", 2),
            item("top_books", 1).depends_on("library", "top_ratings"),
            item("top_narrations", 1).depends_on("library", "top_books"),
            item("top_authors", 1).depends_on("library", "top_books"),
        ]);
        (from, to)
    }

    #[test]
    fn test_apply_plan_reaches_target() {
        let (from, to) = snapshots();
        let plan = Autodetector::new().plan(&from, &to).unwrap();

        let mut state = SqlState::from_graph(from);
        state.apply_plan(&plan);
        assert_same(&state.into_graph().unwrap(), &to);
    }

    #[test]
    fn test_unapply_plan_restores_source() {
        let (from, to) = snapshots();
        let plan = Autodetector::new().plan(&from, &to).unwrap();

        let mut state = SqlState::from_graph(from.clone());
        state.apply_plan(&plan);
        state.unapply_plan(&plan);
        assert_same(&state.into_graph().unwrap(), &from);
    }

    #[test]
    fn test_unapply_alter_without_reverse() {
        let from = graph(&[
            SqlItem::new("top_ratings", "CREATE OR REPLACE FUNCTION top_ratings() -- 1"),
            item("top_books", 1),
        ]);
        let to = graph(&[
            SqlItem::new("top_ratings", "CREATE OR REPLACE FUNCTION top_ratings() -- 2"),
            item("top_books", 1).depends_on("library", "top_ratings"),
        ]);
        let plan = Autodetector::new().plan(&from, &to).unwrap();

        let mut state = SqlState::from_graph(from.clone());
        state.apply_plan(&plan);
        state.unapply_plan(&plan);
        let restored = state.into_graph().unwrap();
        assert_same(&restored, &from);
        assert!(crate::diff::SnapshotDiff::compute(&restored, &from).is_empty());
    }

    #[test]
    fn test_replay_from_empty() {
        let (_, to) = snapshots();
        let plan = Autodetector::new().plan(&SqlStateGraph::new(), &to).unwrap();

        let mut state = SqlState::new();
        state.apply_plan(&plan);
        assert_same(&state.into_graph().unwrap(), &to);
    }
}
