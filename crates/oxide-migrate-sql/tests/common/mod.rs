#![allow(dead_code)]

use std::collections::BTreeMap;

use oxide_migrate_sql::prelude::*;

/// A composite type declaration in the shape the end-to-end suite uses:
/// one field per dependency plus `version` int fields.
pub fn item(name: &str, version: usize, dependencies: &[(&str, &str)]) -> SqlItem {
    let mut args: Vec<String> = dependencies
        .iter()
        .map(|(_, dep)| format!("{dep}{version} {dep}"))
        .collect();
    args.extend((1..=version).map(|i| format!("arg{i} int")));

    let mut item = SqlItem::new(
        name,
        format!("CREATE TYPE {name} AS ({}); -- {version}", args.join(", ")),
    )
    .reverse(format!("DROP TYPE {name}"));
    for (namespace, dep) in dependencies {
        item = item.depends_on(*namespace, *dep);
    }
    item
}

pub fn plan(from: &Declarations, to: &Declarations) -> Plan {
    let from = from.build_graph().unwrap_or_else(|e| panic!("Invalid from: {e}"));
    let to = to.build_graph().unwrap_or_else(|e| panic!("Invalid to: {e}"));
    Autodetector::new()
        .plan(&from, &to)
        .unwrap_or_else(|e| panic!("Planning failed: {e}"))
}

pub fn descriptions(plan: &Plan) -> Vec<String> {
    plan.iter().map(PlanStep::description).collect()
}

pub fn position(plan: &Plan, description: &str) -> usize {
    descriptions(plan)
        .iter()
        .position(|d| d == description)
        .unwrap_or_else(|| panic!("Missing step {description}: {:?}", descriptions(plan)))
}

pub fn assert_before(plan: &Plan, first: &str, then: &str) {
    assert!(
        position(plan, first) < position(plan, then),
        "{first} should run before {then}: {:?}",
        descriptions(plan)
    );
}

/// Asserts that every step only waits for steps emitted before it, as
/// resolved by the chained construct checker.
pub fn assert_markers_point_backwards(plan: &Plan) {
    let checker = ConstructStepChecker::new(SchemaDependencyChecker);
    let ops: Vec<HostOperation<'_>> = plan.iter().map(HostOperation::Construct).collect();
    for (pos, step) in plan.iter().enumerate() {
        for dep in &step.dependencies {
            for satisfied in checker.satisfied_by(&ops, dep) {
                assert!(
                    satisfied < pos,
                    "{} waits for later step {}",
                    step.description(),
                    plan.steps[satisfied].description()
                );
            }
        }
    }
}

/// In-memory catalog of composite types that enforces references the way
/// a database would: a type can only use existing types, and can't be
/// dropped while another type uses it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Catalog {
    types: BTreeMap<String, (String, Vec<String>)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates every construct of `declarations`, parents first.
    pub fn with(declarations: &Declarations) -> Self {
        let mut catalog = Self::new();
        let p = plan(&Declarations::new(), declarations);
        catalog.apply(&p);
        catalog
    }

    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn definition(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(|(sql, _)| sql.as_str())
    }

    pub fn run(&mut self, payload: &SqlPayload) {
        for statement in payload.statements() {
            self.execute(&statement.sql);
        }
    }

    /// Runs every step forward in emission order.
    pub fn apply(&mut self, plan: &Plan) {
        for step in plan.iter() {
            self.run(&step.sql);
        }
    }

    /// Runs every reverse payload in reverse emission order.
    pub fn rollback(&mut self, plan: &Plan) {
        for step in plan.iter().rev() {
            let reverse = step
                .reverse_sql
                .as_ref()
                .unwrap_or_else(|| panic!("{} is not reversible", step.description()));
            self.run(reverse);
        }
    }

    fn execute(&mut self, sql: &str) {
        if let Some(rest) = sql.strip_prefix("CREATE TYPE ") {
            let name = rest.split_whitespace().next().unwrap().to_string();
            let start = rest.find('(').unwrap();
            let end = rest.rfind(')').unwrap();
            let uses: Vec<String> = rest[start + 1..end]
                .split(',')
                .filter_map(|field| field.split_whitespace().nth(1))
                .filter(|ty| *ty != "int")
                .map(ToString::to_string)
                .collect();

            assert!(!self.types.contains_key(&name), "type {name} already exists");
            for used in &uses {
                assert!(self.types.contains_key(used), "type {name} uses missing type {used}");
            }
            self.types.insert(name, (sql.to_string(), uses));
        } else if let Some(name) = sql.strip_prefix("DROP TYPE ") {
            let name = name.trim();
            assert!(self.types.contains_key(name), "type {name} does not exist");
            let users: Vec<&String> = self
                .types
                .iter()
                .filter(|(_, (_, uses))| uses.iter().any(|u| u == name))
                .map(|(other, _)| other)
                .collect();
            assert!(users.is_empty(), "type {name} is still used by {users:?}");
            self.types.remove(name);
        } else {
            panic!("Unsupported statement: {sql}");
        }
    }
}
