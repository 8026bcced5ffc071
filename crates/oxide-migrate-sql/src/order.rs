//! Ordering of added and changed constructs.
//!
//! The resulting order lists dependents before the constructs they depend
//! on. Teardown walks it forward, rebuild walks it backward.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::debug;

use crate::error::Result;
use crate::graph::SqlStateGraph;
use crate::item::ConstructKey;

/// Outcome of [`ChangeOrderer::order`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOrder {
    /// Every added or changed key exactly once, dependents first.
    pub keys: Vec<ConstructKey>,
    /// Changed keys, including unchanged dependents pulled in by a change.
    pub changed: BTreeSet<ConstructKey>,
    /// The subset of `changed` that was pulled in by a change.
    pub cascaded: Vec<ConstructKey>,
}

impl ChangeOrder {
    /// Returns true if `key` must be torn down and rebuilt.
    #[must_use]
    pub fn is_changed(&self, key: &ConstructKey) -> bool {
        self.changed.contains(key)
    }
}

/// Orders changes against one snapshot (`to` for rebuilds, `from` for deletions).
#[derive(Debug)]
pub struct ChangeOrderer<'a> {
    graph: &'a SqlStateGraph,
}

impl<'a> ChangeOrderer<'a> {
    /// Creates an orderer for `graph`.
    #[must_use]
    pub const fn new(graph: &'a SqlStateGraph) -> Self {
        Self { graph }
    }

    /// Orders `added` and `changed` keys.
    ///
    /// Each key is placed right before the first already-placed key among its
    /// ancestors, or appended if none is placed yet. When a changed key is
    /// placed, each of its descendants that isn't already part of the change
    /// set is placed the same way and becomes changed too.
    pub fn order(
        &self,
        added: &[ConstructKey],
        changed: &[ConstructKey],
    ) -> Result<ChangeOrder> {
        let seeds: HashSet<&ConstructKey> = added.iter().chain(changed).collect();
        let mut changed_keys: BTreeSet<ConstructKey> = changed.iter().cloned().collect();

        // Registration order keeps the result reproducible.
        let mut queue: VecDeque<&ConstructKey> =
            self.graph.keys().filter(|key| seeds.contains(key)).collect();

        let mut result = Vec::with_capacity(seeds.len());
        let mut placed = HashSet::new();
        let mut cascaded = Vec::new();

        while let Some(key) = queue.pop_front() {
            self.place(key, &mut result)?;
            placed.insert(key.clone());

            if !changed_keys.contains(key) {
                continue;
            }

            for desc in self.graph.descendants(key)?.into_iter().skip(1) {
                if seeds.contains(&desc) || placed.contains(&desc) {
                    continue;
                }
                debug!(key = %desc, cause = %key, "Cascading change to dependent SQL construct");
                self.place(&desc, &mut result)?;
                placed.insert(desc.clone());
                changed_keys.insert(desc.clone());
                cascaded.push(desc);
            }
        }

        Ok(ChangeOrder {
            keys: result,
            changed: changed_keys,
            cascaded,
        })
    }

    /// Inserts `key` before the first of its ancestors already in `result`.
    fn place(&self, key: &ConstructKey, result: &mut Vec<ConstructKey>) -> Result<()> {
        let mut ancestors = self.graph.ancestors(key)?;
        ancestors.pop();
        let ancestors: HashSet<ConstructKey> = ancestors.into_iter().collect();

        let pos = result
            .iter()
            .position(|placed| ancestors.contains(placed))
            .unwrap_or(result.len());
        result.insert(pos, key.clone());
        Ok(())
    }
}
