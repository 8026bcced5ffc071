//! Snapshot comparison.

use tracing::debug;

use crate::graph::SqlStateGraph;
use crate::item::ConstructKey;

/// Keys that differ between two snapshots.
///
/// Every list follows registration order of the graph it was taken from:
/// `added` and `changed` follow the `to` graph, `removed` the `from` graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Keys only present in `to`.
    pub added: Vec<ConstructKey>,
    /// Keys only present in `from`.
    pub removed: Vec<ConstructKey>,
    /// Keys present in both whose payloads differ.
    pub changed: Vec<ConstructKey>,
}

impl SnapshotDiff {
    /// Compares two snapshots by key and by payload.
    ///
    /// Keys with equal payloads on both sides appear in no list.
    #[must_use]
    pub fn compute(from: &SqlStateGraph, to: &SqlStateGraph) -> Self {
        let mut diff = Self::default();

        for key in to.keys() {
            match (from.get(key), to.get(key)) {
                (None, _) => diff.added.push(key.clone()),
                (Some(old), Some(new)) if old != new => diff.changed.push(key.clone()),
                _ => {}
            }
        }

        diff.removed = from.keys().filter(|key| !to.contains(key)).cloned().collect();

        debug!(
            added = diff.added.len(),
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            "Compared SQL snapshots"
        );
        diff
    }

    /// Returns true if both snapshots hold the same constructs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
