//! Plan rendering.
//!
//! Plans are rendered either as the log a `makemigrations` run prints, or as
//! a JSON document a host can persist and replay.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::plan::{Plan, PlanStep};

/// Renders plans as text or JSON.
#[derive(Debug, Clone, Default)]
pub struct PlanWriter {
    namespaces: Option<BTreeSet<String>>,
}

impl PlanWriter {
    /// Creates a writer that renders every step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the text log to steps of the given namespaces.
    ///
    /// JSON output always contains the whole plan so that every marker
    /// still points at an existing step.
    #[must_use]
    pub fn only_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespaces: BTreeSet<String> = namespaces.into_iter().map(Into::into).collect();
        self.namespaces = if namespaces.is_empty() {
            None
        } else {
            Some(namespaces)
        };
        self
    }

    fn includes(&self, step: &PlanStep) -> bool {
        self.namespaces
            .as_ref()
            .is_none_or(|namespaces| namespaces.contains(&step.key.namespace))
    }

    /// Returns log lines grouped by namespace, in order of first appearance.
    #[must_use]
    pub fn log_lines(&self, plan: &Plan) -> Vec<String> {
        let steps: Vec<&PlanStep> = plan.iter().filter(|step| self.includes(step)).collect();

        let mut namespaces: Vec<&str> = Vec::new();
        for &step in &steps {
            if !namespaces.contains(&step.key.namespace.as_str()) {
                namespaces.push(&step.key.namespace);
            }
        }

        let mut lines = Vec::new();
        for namespace in namespaces {
            lines.push(format!("Migrations for '{namespace}':"));
            for step in steps.iter().filter(|step| step.key.namespace == namespace) {
                lines.push(format!("  - {}", step.description()));
            }
        }
        lines
    }

    /// Renders the log as one string, or a notice when there is nothing to do.
    #[must_use]
    pub fn render_text(&self, plan: &Plan) -> String {
        let lines = self.log_lines(plan);
        if lines.is_empty() {
            "No changes detected".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Renders the whole plan as pretty-printed JSON.
    pub fn render_json(&self, plan: &Plan) -> Result<String> {
        Ok(serde_json::to_string_pretty(plan)?)
    }
}
