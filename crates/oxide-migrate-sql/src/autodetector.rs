//! Autodetector for generating construct migrations from snapshot changes.
//!
//! This module compares two construct snapshots and emits the steps needed
//! to move a database from one to the other:
//!
//! 1. teardown of every changed construct, dependents first;
//! 2. rebuild of every added or changed construct, foundations first;
//! 3. deletion of every construct that is gone.
//!
//! Each step carries markers naming the exact earlier steps it must follow.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::dependency::{ConstructMarker, Dependency};
use crate::diff::SnapshotDiff;
use crate::error::{MigrateSqlError, Result};
use crate::graph::SqlStateGraph;
use crate::item::{Construct, ConstructKey, SqlPayload};
use crate::order::{ChangeOrder, ChangeOrderer};
use crate::plan::{Plan, PriorDefinition, StepAction, StepId};

/// Options for the autodetector.
#[derive(Debug, Clone)]
pub struct AutodetectorOptions {
    /// Whether to emit `Delete` steps for constructs that are gone.
    pub emit_deletions: bool,
}

impl Default for AutodetectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AutodetectorOptions {
    /// Creates default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            emit_deletions: true,
        }
    }

    /// Keeps removed constructs in the database.
    #[must_use]
    pub const fn without_deletions(mut self) -> Self {
        self.emit_deletions = false;
        self
    }
}

/// Detects construct changes and generates plan steps.
#[derive(Debug, Default)]
pub struct Autodetector {
    options: AutodetectorOptions,
}

impl Autodetector {
    /// Creates a new autodetector with default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            options: AutodetectorOptions::new(),
        }
    }

    /// Creates a new autodetector with custom options.
    #[must_use]
    pub const fn with_options(options: AutodetectorOptions) -> Self {
        Self { options }
    }

    /// Compares two snapshots and orders the resulting changes.
    pub fn changes(
        &self,
        from: &SqlStateGraph,
        to: &SqlStateGraph,
    ) -> Result<(SnapshotDiff, ChangeOrder)> {
        let diff = SnapshotDiff::compute(from, to);
        let order = ChangeOrderer::new(to).order(&diff.added, &diff.changed)?;
        Ok((diff, order))
    }

    /// Returns the steps needed to transform `from` into `to`.
    ///
    /// Both graphs must be resolved. Either the whole plan is returned or
    /// an error; there is no partial plan.
    pub fn plan(&self, from: &SqlStateGraph, to: &SqlStateGraph) -> Result<Plan> {
        let (diff, order) = self.changes(from, to)?;

        let mut emitter = Emitter::new(from, to);
        emitter.teardown(&order)?;
        emitter.rebuild(&order)?;
        if self.options.emit_deletions {
            emitter.delete(&diff.removed)?;
        } else if !diff.removed.is_empty() {
            debug!(
                removed = diff.removed.len(),
                "Skipping deletion of removed SQL constructs"
            );
        }

        let mut plan = emitter.finish();
        info!(
            added = diff.added.len(),
            changed = order.changed.len(),
            cascaded = order.cascaded.len(),
            removed = diff.removed.len(),
            steps = plan.len(),
            "Planned SQL construct changes"
        );
        plan.diff = diff;
        plan.order = order;
        Ok(plan)
    }
}

/// Appends steps to a plan, remembering the latest step per construct.
struct Emitter<'a> {
    from: &'a SqlStateGraph,
    to: &'a SqlStateGraph,
    plan: Plan,
    latest: HashMap<ConstructKey, Option<StepId>>,
    untorn: HashMap<ConstructKey, PriorDefinition>,
}

impl<'a> Emitter<'a> {
    fn new(from: &'a SqlStateGraph, to: &'a SqlStateGraph) -> Self {
        Self {
            from,
            to,
            plan: Plan::new(),
            latest: HashMap::new(),
            untorn: HashMap::new(),
        }
    }

    /// Undoes the old definition of each changed construct, dependents first.
    fn teardown(&mut self, order: &ChangeOrder) -> Result<()> {
        for key in order.keys.iter().filter(|key| order.is_changed(key)) {
            let old = lookup(self.from, key)?;
            let children: BTreeSet<ConstructKey> = self.from.children(key).cloned().collect();
            let dependencies = self.markers(&children, key);

            let parents: BTreeSet<ConstructKey> = self.from.parents(key).cloned().collect();
            let Some(reverse_sql) = old.reverse_sql.clone() else {
                warn!(key = %key, "SQL construct has no reverse statements, not tearing it down");
                self.latest.insert(key.clone(), None);
                self.untorn.insert(
                    key.clone(),
                    PriorDefinition {
                        construct: old.clone(),
                        construct_dependencies: parents,
                    },
                );
                continue;
            };

            let id = self.plan.push(
                StepAction::ReverseAlter,
                key.clone(),
                reverse_sql,
                Some(old.sql.clone()),
                parents,
                dependencies,
            );
            debug!(key = %key, step = %id, "Reverse alter SQL");
            self.latest.insert(key.clone(), Some(id));
        }
        Ok(())
    }

    /// Builds the new definition of each added or changed construct,
    /// foundations first.
    fn rebuild(&mut self, order: &ChangeOrder) -> Result<()> {
        for key in order.keys.iter().rev() {
            let new = lookup(self.to, key)?;
            let action = if order.is_changed(key) {
                StepAction::Alter
            } else {
                StepAction::Create
            };
            let parents: BTreeSet<ConstructKey> = self.to.parents(key).cloned().collect();
            let dependencies = self.markers(&parents, key);

            let id = self.plan.push(
                action,
                key.clone(),
                new.sql.clone(),
                new.reverse_sql.clone(),
                parents,
                dependencies,
            );
            if let Some(prior) = self.untorn.remove(key) {
                self.plan.set_prior(id, prior);
            }
            debug!(key = %key, step = %id, action = ?action, "Rebuild SQL");
            self.latest.insert(key.clone(), Some(id));
        }
        Ok(())
    }

    /// Drops constructs that are gone, dependents first.
    fn delete(&mut self, removed: &[ConstructKey]) -> Result<()> {
        let order = ChangeOrderer::new(self.from).order(removed, &[])?;
        for key in &order.keys {
            let old = lookup(self.from, key)?;
            let children: BTreeSet<ConstructKey> = self.from.children(key).cloned().collect();
            let dependencies = self.markers(&children, key);

            let sql = old.reverse_sql.clone().unwrap_or_else(|| {
                warn!(key = %key, "Deleting SQL construct without reverse statements");
                SqlPayload::empty()
            });
            let parents = self.from.parents(key).cloned().collect();
            let id = self.plan.push(
                StepAction::Delete,
                key.clone(),
                sql,
                Some(old.sql.clone()),
                parents,
                dependencies,
            );
            debug!(key = %key, step = %id, "Delete SQL");
            self.latest.insert(key.clone(), Some(id));
        }
        Ok(())
    }

    /// One marker per related key plus `key` itself, each pointing at the
    /// latest step that touched it.
    fn markers(
        &self,
        related: &BTreeSet<ConstructKey>,
        key: &ConstructKey,
    ) -> Vec<Dependency> {
        related
            .iter()
            .chain(std::iter::once(key).filter(|key| !related.contains(*key)))
            .map(|dep| {
                let step = self.latest.get(dep).copied().flatten();
                Dependency::Construct(ConstructMarker::new(dep, step))
            })
            .collect()
    }

    fn finish(self) -> Plan {
        self.plan
    }
}

fn lookup<'g>(graph: &'g SqlStateGraph, key: &ConstructKey) -> Result<&'g Construct> {
    graph
        .get(key)
        .ok_or_else(|| MigrateSqlError::UnknownKey { key: key.clone() })
}
