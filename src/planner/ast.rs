//! Normalized statement structures
//!
//! Statements arrive already parsed; this module only defines their shape.
//! Every type is serde-(de)serializable so statements can be submitted as
//! JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::database::SequenceType;
use crate::index::{IndexType, MapIndexBy};
use crate::schema::PropertyType;
use crate::storage::RecordId;

use super::expr::{Condition, Expr};

/// Sort direction of an `ORDER BY` item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` item; no direction means ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    #[serde(default)]
    pub direction: Option<OrderDirection>,
}

impl OrderItem {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: Some(OrderDirection::Asc),
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: Some(OrderDirection::Desc),
        }
    }

    pub fn effective_direction(&self) -> OrderDirection {
        self.direction.unwrap_or(OrderDirection::Asc)
    }
}

/// One projection item: `expr [AS alias]`, `!field`, or
/// `field:{nested items}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionItem {
    pub expr: Expr,
    #[serde(default)]
    pub alias: Option<String>,
    /// `!field`: removes the field from a `*` projection
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub nested: Option<Vec<ProjectionItem>>,
}

impl ProjectionItem {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            exclude: false,
            nested: None,
        }
    }

    pub fn field(name: &str) -> Self {
        Self::new(Expr::field(name))
    }

    pub fn star() -> Self {
        Self::new(Expr::Star)
    }

    pub fn excluded(name: &str) -> Self {
        Self {
            exclude: true,
            ..Self::field(name)
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_nested(mut self, items: Vec<ProjectionItem>) -> Self {
        self.nested = Some(items);
        self
    }

    /// Output column name
    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.expr.default_alias())
    }
}

/// `LET name = expr`; subqueries are expressed as [`Expr::Subquery`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetItem {
    pub name: String,
    pub expr: Expr,
}

/// Pseudo-tables exposing database metadata as rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataTarget {
    Schema,
    IndexManager,
    Database,
    Storage,
}

impl MetadataTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataTarget::Schema => "schema",
            MetadataTarget::IndexManager => "indexmanager",
            MetadataTarget::Database => "database",
            MetadataTarget::Storage => "storage",
        }
    }
}

/// A cluster given by id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterRef {
    Id(u32),
    Name(String),
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterRef::Id(id) => write!(f, "{}", id),
            ClusterRef::Name(name) => write!(f, "{}", name),
        }
    }
}

fn yes() -> bool {
    true
}

/// The `FROM` part of a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Class {
        name: String,
        /// Include records of subclasses
        #[serde(default = "yes")]
        polymorphic: bool,
    },
    Clusters {
        clusters: Vec<ClusterRef>,
    },
    Rids {
        rids: Vec<RecordId>,
    },
    /// `index:<name>`, yielding `{key, rid}` rows
    Index {
        name: String,
    },
    Subquery {
        query: Box<SelectStatement>,
    },
    Variable {
        name: String,
    },
    Metadata {
        name: MetadataTarget,
    },
}

impl Target {
    pub fn class(name: &str) -> Self {
        Target::Class {
            name: name.to_string(),
            polymorphic: true,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Class { name, .. } => write!(f, "{}", name),
            Target::Clusters { clusters } => {
                let names: Vec<String> = clusters.iter().map(|c| c.to_string()).collect();
                write!(f, "cluster:[{}]", names.join(", "))
            }
            Target::Rids { rids } => {
                let rids: Vec<String> = rids.iter().map(|r| r.to_string()).collect();
                write!(f, "[{}]", rids.join(", "))
            }
            Target::Index { name } => write!(f, "index:{}", name),
            Target::Subquery { query } => write!(f, "({})", query),
            Target::Variable { name } => write!(f, "${}", name),
            Target::Metadata { name } => write!(f, "metadata:{}", name.as_str()),
        }
    }
}

/// A `SELECT`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStatement {
    /// Empty means `*`
    #[serde(default)]
    pub projection: Vec<ProjectionItem>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default, rename = "let")]
    pub let_items: Vec<LetItem>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Condition>,
    #[serde(default)]
    pub group_by: Vec<Expr>,
    #[serde(default)]
    pub having: Option<Condition>,
    #[serde(default)]
    pub order_by: Vec<OrderItem>,
    #[serde(default)]
    pub unwind: Vec<String>,
    #[serde(default)]
    pub skip: Option<Expr>,
    #[serde(default)]
    pub limit: Option<Expr>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_target(target: Target) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn from_class(class: &str) -> Self {
        Self::from_target(Target::class(class))
    }

    pub fn project(mut self, item: ProjectionItem) -> Self {
        self.projection.push(item);
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.where_clause = Some(condition);
        self
    }

    pub fn let_item(mut self, name: &str, expr: Expr) -> Self {
        self.let_items.push(LetItem {
            name: name.to_string(),
            expr,
        });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn unwind(mut self, field: &str) -> Self {
        self.unwind.push(field.to_string());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn skip(mut self, n: i64) -> Self {
        self.skip = Some(Expr::literal(n));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(Expr::literal(n));
        self
    }

    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout_ms = Some(millis);
        self
    }

    /// True when any projection item or the `HAVING` clause aggregates
    pub fn is_aggregate(&self) -> bool {
        self.projection.iter().any(|p| p.expr.contains_aggregate())
            || self.having.as_ref().is_some_and(Condition::contains_aggregate)
    }

    /// True when the statement reads `$parent` outside of its own nested
    /// subqueries, which resolve `$parent` against this statement instead
    pub fn references_parent(&self) -> bool {
        let mut exprs = self
            .projection
            .iter()
            .map(|p| &p.expr)
            .chain(self.let_items.iter().map(|l| &l.expr))
            .chain(self.group_by.iter())
            .chain(self.order_by.iter().map(|o| &o.expr));
        if exprs.any(Expr::references_parent) {
            return true;
        }
        [&self.where_clause, &self.having]
            .into_iter()
            .flatten()
            .any(Condition::references_parent)
    }

    /// Names of the `$variables` the `WHERE` clause reads
    pub fn where_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(cond) = &self.where_clause {
            cond.collect_variables(&mut out);
        }
        out
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.projection.is_empty() {
            write!(f, "*")?;
        }
        for (i, item) in self.projection.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if item.exclude {
                write!(f, "!")?;
            }
            write!(f, "{}", item.expr)?;
            if let Some(alias) = &item.alias {
                write!(f, " AS {}", alias)?;
            }
        }
        if let Some(target) = &self.target {
            write!(f, " FROM {}", target)?;
        }
        if let Some(cond) = &self.where_clause {
            write!(f, " WHERE {}", cond)?;
        }
        if !self.group_by.is_empty() {
            let items: Vec<String> = self.group_by.iter().map(|e| e.to_string()).collect();
            write!(f, " GROUP BY {}", items.join(", "))?;
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", o.expr, o.effective_direction().as_str()))
                .collect();
            write!(f, " ORDER BY {}", items.join(", "))?;
        }
        if let Some(skip) = &self.skip {
            write!(f, " SKIP {}", skip)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// `field = expr` in `INSERT … SET` and `UPDATE … SET`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    pub field: String,
    pub expr: Expr,
}

impl SetItem {
    pub fn new(field: &str, expr: Expr) -> Self {
        Self {
            field: field.to_string(),
            expr,
        }
    }
}

/// `INSERT INTO class [CLUSTER c] SET … | FROM (SELECT …)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub class: String,
    #[serde(default)]
    pub cluster: Option<ClusterRef>,
    /// One entry per record to create
    #[serde(default)]
    pub rows: Vec<Vec<SetItem>>,
    #[serde(default)]
    pub from: Option<Box<SelectStatement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub target: Target,
    #[serde(default)]
    pub set: Vec<SetItem>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Condition>,
    #[serde(default)]
    pub limit: Option<Expr>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub target: Target,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Condition>,
    #[serde(default)]
    pub limit: Option<Expr>,
    /// Allows deleting vertices and edges as plain records
    #[serde(default, rename = "unsafe")]
    pub unsafe_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteVertexStatement {
    pub target: Target,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Condition>,
    #[serde(default)]
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClassStatement {
    pub name: String,
    #[serde(default)]
    pub superclasses: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropClassStatement {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
    /// Allows dropping a vertex or edge class that still holds records
    #[serde(default, rename = "unsafe")]
    pub unsafe_drop: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePropertyStatement {
    pub class: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub linked_class: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropPropertyStatement {
    pub class: String,
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
    /// Also drops the indexes that depend on the property
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClusterStatement {
    pub name: String,
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropClusterStatement {
    pub cluster: ClusterRef,
    #[serde(default)]
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexStatement {
    pub name: String,
    pub class: String,
    pub fields: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: IndexType,
    #[serde(default)]
    pub by: Option<MapIndexBy>,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndexStatement {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSequenceStatement {
    pub name: String,
    #[serde(default, rename = "type")]
    pub sequence_type: SequenceType,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub increment: Option<i64>,
    #[serde(default)]
    pub cache: Option<i64>,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSequenceStatement {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserStatement {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropUserStatement {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSecurityPolicyStatement {
    pub name: String,
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSecurityPolicyStatement {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepStatement {
    pub millis: u64,
}

/// Any statement the engine can plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    DeleteVertex(DeleteVertexStatement),
    CreateClass(CreateClassStatement),
    DropClass(DropClassStatement),
    CreateProperty(CreatePropertyStatement),
    DropProperty(DropPropertyStatement),
    CreateCluster(CreateClusterStatement),
    DropCluster(DropClusterStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    CreateSequence(CreateSequenceStatement),
    DropSequence(DropSequenceStatement),
    CreateUser(CreateUserStatement),
    DropUser(DropUserStatement),
    CreateSecurityPolicy(CreateSecurityPolicyStatement),
    DropSecurityPolicy(DropSecurityPolicyStatement),
    Sleep(SleepStatement),
    OptimizeDatabase,
    Explain { inner: Box<Statement> },
    Profile { inner: Box<Statement> },
}

impl Statement {
    /// Short upper-case name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::DeleteVertex(_) => "DELETE VERTEX",
            Statement::CreateClass(_) => "CREATE CLASS",
            Statement::DropClass(_) => "DROP CLASS",
            Statement::CreateProperty(_) => "CREATE PROPERTY",
            Statement::DropProperty(_) => "DROP PROPERTY",
            Statement::CreateCluster(_) => "CREATE CLUSTER",
            Statement::DropCluster(_) => "DROP CLUSTER",
            Statement::CreateIndex(_) => "CREATE INDEX",
            Statement::DropIndex(_) => "DROP INDEX",
            Statement::CreateSequence(_) => "CREATE SEQUENCE",
            Statement::DropSequence(_) => "DROP SEQUENCE",
            Statement::CreateUser(_) => "CREATE USER",
            Statement::DropUser(_) => "DROP USER",
            Statement::CreateSecurityPolicy(_) => "CREATE SECURITY POLICY",
            Statement::DropSecurityPolicy(_) => "DROP SECURITY POLICY",
            Statement::Sleep(_) => "SLEEP",
            Statement::OptimizeDatabase => "OPTIMIZE DATABASE",
            Statement::Explain { .. } => "EXPLAIN",
            Statement::Profile { .. } => "PROFILE",
        }
    }

    /// True for schema and administration commands
    pub fn is_ddl(&self) -> bool {
        !matches!(
            self,
            Statement::Select(_)
                | Statement::Insert(_)
                | Statement::Update(_)
                | Statement::Delete(_)
                | Statement::DeleteVertex(_)
                | Statement::Explain { .. }
                | Statement::Profile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::expr::CompareOp;

    #[test]
    fn test_select_from_json() {
        let json = serde_json::json!({
            "statement": "select",
            "projection": [{"expr": {"kind": "field", "path": ["name"]}, "alias": "n"}],
            "target": {"kind": "class", "name": "Person"},
            "where": {
                "kind": "compare",
                "left": {"kind": "field", "path": ["age"]},
                "op": "ge",
                "right": {"kind": "literal", "value": {"type": "int", "value": 18}}
            },
            "order_by": [{"expr": {"kind": "field", "path": ["name"]}, "direction": "desc"}],
            "limit": {"kind": "literal", "value": {"type": "long", "value": 10}}
        });
        let stmt: Statement = serde_json::from_value(json).unwrap();
        let expected = SelectStatement::from_class("Person")
            .project(ProjectionItem::field("name").alias("n"))
            .filter(Condition::field("age", CompareOp::Ge, 18))
            .order_by(OrderItem::desc(Expr::field("name")))
            .limit(10);
        assert_eq!(stmt, Statement::Select(expected));
    }

    #[test]
    fn test_ddl_from_json() {
        let json = serde_json::json!({"statement": "drop_class", "name": "T", "if_exists": true});
        let stmt: Statement = serde_json::from_value(json).unwrap();
        assert!(stmt.is_ddl());
        assert_eq!(stmt.kind(), "DROP CLASS");
        let json = serde_json::json!({"statement": "optimize_database"});
        assert_eq!(
            serde_json::from_value::<Statement>(json).unwrap(),
            Statement::OptimizeDatabase
        );
    }

    #[test]
    fn test_select_display() {
        let stmt = SelectStatement::from_class("T")
            .filter(Condition::field("name", CompareOp::Gt, "name3"))
            .order_by(OrderItem::asc(Expr::field("name")))
            .limit(5);
        assert_eq!(
            stmt.to_string(),
            "SELECT * FROM T WHERE name > 'name3' ORDER BY name ASC LIMIT 5"
        );
    }

    #[test]
    fn test_references_parent() {
        let inner = SelectStatement::from_class("B").filter(Condition::compare(
            Expr::field("a"),
            CompareOp::Eq,
            Expr::variable("$parent.$current.a"),
        ));
        assert!(inner.references_parent());
        let outer = SelectStatement::from_class("A").let_item("x", Expr::subquery(inner));
        assert!(!outer.references_parent());
        assert!(outer.let_items[0].expr.depends_on_row());
    }
}
