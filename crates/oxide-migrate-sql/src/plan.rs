//! Migration plan produced by the autodetector.
//!
//! A plan is an arena of steps. Steps refer to each other through
//! [`StepId`] handles stored in their dependency markers, never by value.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dependency::{ConstructMarker, Dependency};
use crate::diff::SnapshotDiff;
use crate::item::{Construct, ConstructKey, SqlPayload};
use crate::order::ChangeOrder;

/// Handle to a step inside one [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(usize);

impl StepId {
    /// Position of the step in emission order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a step does to its construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Create a construct that didn't exist before.
    Create,
    /// Rebuild a construct with its new definition.
    Alter,
    /// Tear down the old definition ahead of an `Alter`.
    ReverseAlter,
    /// Drop a construct that no longer exists.
    Delete,
}

/// One forward/reverse operation on a single construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Handle of this step.
    pub id: StepId,
    /// Kind of step.
    pub action: StepAction,
    /// Construct touched by this step.
    pub key: ConstructKey,
    /// Statements to run when applying the step.
    pub sql: SqlPayload,
    /// Statements to run when unapplying the step.
    pub reverse_sql: Option<SqlPayload>,
    /// Parents of the construct in the snapshot this step leaves behind
    /// (`to` for Create/Alter, `from` for ReverseAlter/Delete).
    pub construct_dependencies: BTreeSet<ConstructKey>,
    /// Steps (or host operations) that must run first.
    pub dependencies: Vec<Dependency>,
    /// Definition an `Alter` overwrites when the old one had no reverse
    /// statements and was never torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorDefinition>,
}

/// Old definition of a construct and its parents in the `from` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorDefinition {
    /// The overwritten construct.
    pub construct: Construct,
    /// Its parents before the step ran.
    pub construct_dependencies: BTreeSet<ConstructKey>,
}

impl PlanStep {
    /// Returns true if this step can be unapplied.
    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        self.reverse_sql.is_some()
    }

    /// Returns true if this step touches `key`.
    #[must_use]
    pub fn touches(&self, key: &ConstructKey) -> bool {
        &self.key == key
    }

    /// Construct markers among this step's dependencies.
    pub fn construct_markers(&self) -> impl Iterator<Item = &ConstructMarker> {
        self.dependencies.iter().filter_map(|dep| match dep {
            Dependency::Construct(marker) => Some(marker),
            Dependency::Schema(_) => None,
        })
    }

    /// Prior steps this step must wait for.
    pub fn required_steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.construct_markers().filter_map(|marker| marker.step)
    }

    /// Returns a human-readable description of this step.
    #[must_use]
    pub fn description(&self) -> String {
        let verb = match self.action {
            StepAction::Create => "Create SQL",
            StepAction::Alter => "Alter SQL",
            StepAction::ReverseAlter => "Reverse alter SQL",
            StepAction::Delete => "Delete SQL",
        };
        format!("{verb} \"{}\"", self.key.name)
    }
}

/// Ordered steps plus the analysis that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Steps in emission order.
    pub steps: Vec<PlanStep>,
    /// Snapshot comparison the plan was built from.
    #[serde(skip)]
    pub diff: SnapshotDiff,
    /// Change order the plan was built from.
    #[serde(skip)]
    pub order: ChangeOrder,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step and returns its handle.
    pub fn push(
        &mut self,
        action: StepAction,
        key: ConstructKey,
        sql: SqlPayload,
        reverse_sql: Option<SqlPayload>,
        construct_dependencies: BTreeSet<ConstructKey>,
        dependencies: Vec<Dependency>,
    ) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(PlanStep {
            id,
            action,
            key,
            sql,
            reverse_sql,
            construct_dependencies,
            dependencies,
            prior: None,
        });
        id
    }

    /// Records the definition step `id` overwrites.
    ///
    /// Returns false if `id` doesn't belong to this plan.
    pub fn set_prior(&mut self, id: StepId, prior: PriorDefinition) -> bool {
        match self.steps.get_mut(id.0) {
            Some(step) => {
                step.prior = Some(prior);
                true
            }
            None => false,
        }
    }

    /// Attaches an extra dependency (usually a host schema dependency) to a step.
    ///
    /// Returns false if `id` doesn't belong to this plan.
    pub fn add_dependency(&mut self, id: StepId, dependency: Dependency) -> bool {
        match self.steps.get_mut(id.0) {
            Some(step) => {
                step.dependencies.push(dependency);
                true
            }
            None => false,
        }
    }

    /// Returns the step behind `id`.
    #[must_use]
    pub fn get(&self, id: StepId) -> Option<&PlanStep> {
        self.steps.get(id.0)
    }

    /// Iterates over steps in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// Steps touching constructs of `namespace`.
    pub fn steps_for<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a PlanStep> {
        self.steps
            .iter()
            .filter(move |step| step.key.namespace == namespace)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if every step can be unapplied.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        self.steps.iter().all(PlanStep::is_reversible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::SchemaDependency;

    fn step_plan() -> Plan {
        let mut plan = Plan::new();
        let books = ConstructKey::new("library", "top_books");
        let first = plan.push(
            StepAction::Create,
            books.clone(),
            "CREATE TYPE top_books AS (a int)".into(),
            Some("DROP TYPE top_books".into()),
            BTreeSet::new(),
            vec![Dependency::Construct(ConstructMarker::new(&books, None))],
        );
        let authors = ConstructKey::new("library", "top_authors");
        plan.push(
            StepAction::Create,
            authors.clone(),
            "CREATE TYPE top_authors AS (b top_books)".into(),
            None,
            BTreeSet::from([books.clone()]),
            vec![
                Dependency::Construct(ConstructMarker::new(&books, Some(first))),
                Dependency::Construct(ConstructMarker::new(&authors, None)),
            ],
        );
        plan
    }

    #[test]
    fn test_push_assigns_sequential_ids() {
        let plan = step_plan();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].id.index(), 0);
        assert_eq!(plan.steps[1].id.index(), 1);
        assert_eq!(
            plan.get(plan.steps[1].id).map(|s| s.key.name.as_str()),
            Some("top_authors")
        );
    }

    #[test]
    fn test_required_steps() {
        let plan = step_plan();
        let required: Vec<StepId> = plan.steps[1].required_steps().collect();
        assert_eq!(required, vec![plan.steps[0].id]);
        assert_eq!(plan.steps[0].required_steps().count(), 0);
    }

    #[test]
    fn test_descriptions() {
        let plan = step_plan();
        assert_eq!(plan.steps[0].description(), "Create SQL \"top_books\"");
        let mut step = plan.steps[0].clone();
        step.action = StepAction::ReverseAlter;
        assert_eq!(step.description(), "Reverse alter SQL \"top_books\"");
    }

    #[test]
    fn test_reversibility() {
        let plan = step_plan();
        assert!(plan.steps[0].is_reversible());
        assert!(!plan.is_reversible());
    }

    #[test]
    fn test_iter_runs_backwards() {
        let plan = step_plan();
        let names: Vec<&str> = plan.iter().rev().map(|s| s.key.name.as_str()).collect();
        assert_eq!(names, vec!["top_authors", "top_books"]);
        assert_eq!(plan.iter().len(), 2);
    }

    #[test]
    fn test_set_prior() {
        let mut plan = step_plan();
        let prior = PriorDefinition {
            construct: Construct::new("CREATE TYPE top_books AS (z int)", None),
            construct_dependencies: BTreeSet::new(),
        };
        assert!(plan.set_prior(plan.steps[0].id, prior.clone()));
        assert_eq!(plan.steps[0].prior, Some(prior));
        assert!(plan.steps[1].prior.is_none());

        let json = serde_json::to_value(&plan.steps[1]).unwrap();
        assert!(json.get("prior").is_none());
    }

    #[test]
    fn test_add_host_dependency() {
        let mut plan = step_plan();
        let id = plan.steps[0].id;
        let table = SchemaDependency::table_created("library", "book");
        assert!(plan.add_dependency(id, Dependency::Schema(table)));
        assert_eq!(plan.steps[0].dependencies.len(), 2);
        assert_eq!(plan.steps[0].construct_markers().count(), 1);
    }
}
