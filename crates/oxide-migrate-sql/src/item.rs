//! SQL construct values.
//!
//! A construct is a named database object (stored function, view, composite
//! type) described only by the statements that create it and the statements
//! that tear it down. Statement text is never parsed: two constructs are the
//! same when their payloads are equal value by value.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a construct within a snapshot: `(namespace, name)`.
///
/// The namespace is the owning module or application label. The same key in
/// two snapshots refers to the same construct, possibly changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ConstructKey {
    /// Owning namespace.
    pub namespace: String,
    /// Construct name, unique within the namespace.
    pub name: String,
}

impl ConstructKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ConstructKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl From<(String, String)> for ConstructKey {
    fn from((namespace, name): (String, String)) -> Self {
        Self { namespace, name }
    }
}

impl From<ConstructKey> for (String, String) {
    fn from(key: ConstructKey) -> Self {
        (key.namespace, key.name)
    }
}

impl From<(&str, &str)> for ConstructKey {
    fn from((namespace, name): (&str, &str)) -> Self {
        Self::new(namespace, name)
    }
}

/// One statement with optional positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StatementRepr")]
pub struct SqlStatement {
    /// Statement text, passed through untouched.
    pub sql: String,
    /// Positional parameters. An empty list is stored as `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

impl SqlStatement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: None,
        }
    }

    /// Creates a statement with positional parameters.
    ///
    /// Any iterable of values is accepted; only the iterated values matter
    /// for equality.
    #[must_use]
    pub fn with_params<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let params: Vec<Value> = params.into_iter().map(Into::into).collect();
        Self {
            sql: sql.into(),
            params: if params.is_empty() { None } else { Some(params) },
        }
    }
}

/// Accepted JSON shapes for a statement: `"sql"`, `["sql", [params]]` or
/// `{"sql": .., "params": [..]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StatementRepr {
    Bare(String),
    Pair(String, Option<Vec<Value>>),
    Full {
        sql: String,
        #[serde(default)]
        params: Option<Vec<Value>>,
    },
}

impl From<StatementRepr> for SqlStatement {
    fn from(repr: StatementRepr) -> Self {
        match repr {
            StatementRepr::Bare(sql) => Self::new(sql),
            StatementRepr::Pair(sql, params) | StatementRepr::Full { sql, params } => {
                Self::with_params(sql, params.unwrap_or_default())
            }
        }
    }
}

/// Forward or reverse definition of a construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlPayload {
    /// A single statement without parameters.
    Single(String),
    /// An ordered sequence of statements, each with optional parameters.
    Batch(Vec<SqlStatement>),
}

impl SqlPayload {
    /// A payload with no statements.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Batch(Vec::new())
    }

    /// Returns true if running this payload would do nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(sql) => sql.is_empty(),
            Self::Batch(statements) => statements.is_empty(),
        }
    }

    /// Returns the statements of this payload in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<SqlStatement> {
        match self {
            Self::Single(sql) if sql.is_empty() => Vec::new(),
            Self::Single(sql) => vec![SqlStatement::new(sql.clone())],
            Self::Batch(statements) => statements.clone(),
        }
    }
}

impl From<&str> for SqlPayload {
    fn from(sql: &str) -> Self {
        Self::Single(sql.to_string())
    }
}

impl From<String> for SqlPayload {
    fn from(sql: String) -> Self {
        Self::Single(sql)
    }
}

impl From<Vec<SqlStatement>> for SqlPayload {
    fn from(statements: Vec<SqlStatement>) -> Self {
        Self::Batch(statements)
    }
}

/// The payload of one construct in one snapshot.
///
/// Equality compares forward and reverse payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construct {
    /// Statements that create the construct.
    pub sql: SqlPayload,
    /// Statements that tear the construct down, if any.
    pub reverse_sql: Option<SqlPayload>,
}

impl Construct {
    /// Creates a construct. An empty reverse payload is stored as `None`.
    #[must_use]
    pub fn new(sql: impl Into<SqlPayload>, reverse_sql: Option<SqlPayload>) -> Self {
        Self {
            sql: sql.into(),
            reverse_sql: reverse_sql.filter(|reverse| !reverse.is_empty()),
        }
    }

    /// Returns true if the construct can be torn down.
    #[must_use]
    pub const fn has_reverse(&self) -> bool {
        self.reverse_sql.is_some()
    }
}

/// A construct declaration as written by a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlItem {
    /// Construct name, unique within its namespace.
    pub name: String,
    /// Forward statements.
    pub sql: SqlPayload,
    /// Reverse statements.
    #[serde(default)]
    pub reverse_sql: Option<SqlPayload>,
    /// Constructs that must exist before this one.
    #[serde(default)]
    pub dependencies: Vec<ConstructKey>,
}

impl SqlItem {
    /// Creates a declaration with no reverse statements and no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, sql: impl Into<SqlPayload>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            reverse_sql: None,
            dependencies: Vec::new(),
        }
    }

    /// Sets the reverse statements.
    #[must_use]
    pub fn reverse(mut self, reverse_sql: impl Into<SqlPayload>) -> Self {
        self.reverse_sql = Some(reverse_sql.into());
        self
    }

    /// Adds a dependency on `namespace.name`.
    #[must_use]
    pub fn depends_on(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.dependencies.push(ConstructKey::new(namespace, name));
        self
    }

    /// Returns the construct payload of this declaration.
    #[must_use]
    pub fn construct(&self) -> Construct {
        Construct::new(self.sql.clone(), self.reverse_sql.clone())
    }
}
