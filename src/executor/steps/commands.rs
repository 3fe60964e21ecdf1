//! Schema and administration commands
//!
//! Every command is a single terminal step. It validates first and only
//! then changes anything, so a failing command emits no rows. The rows it
//! does emit are informational and keyed by `operation`.

use std::time::Duration;

use tracing::{info, warn};

use crate::database::{DatabaseResult, DatabaseSession, SecurityPolicy, SequenceDef};
use crate::index::IndexDefinition;
use crate::planner::{
    ClusterRef, CreateClassStatement, CreateClusterStatement, CreateIndexStatement,
    CreatePropertyStatement, CreateSecurityPolicyStatement, CreateSequenceStatement,
    CreateUserStatement, DropClassStatement, DropClusterStatement, DropIndexStatement,
    DropPropertyStatement, DropSecurityPolicyStatement, DropSequenceStatement, DropUserStatement,
    SleepStatement,
};
use crate::schema::{PropertyDef, PropertyType};
use crate::value::{Properties, Value};

use crate::executor::context::ExecutionContext;
use crate::executor::errors::{ExecResult, ExecutorError};
use crate::executor::result::QueryResult;
use crate::executor::stream::ExecutionStream;

/// Longest single sleep between two deadline checks
const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub enum DdlCommand {
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
}

fn info_row(operation: &str, fields: &[(&str, Value)]) -> QueryResult {
    let mut props = Properties::with_capacity(fields.len() + 1);
    props.set("operation", operation);
    for (name, value) in fields {
        props.set(*name, value.clone());
    }
    QueryResult::projection(props)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandStep {
    pub command: DdlCommand,
}

impl CommandStep {
    pub fn new(command: DdlCommand) -> Self {
        Self { command }
    }

    pub fn name(&self) -> &'static str {
        match &self.command {
            DdlCommand::CreateClass(_) => "CreateClassStep",
            DdlCommand::DropClass(_) => "DropClassStep",
            DdlCommand::CreateProperty(_) => "CreatePropertyStep",
            DdlCommand::DropProperty(_) => "DropPropertyStep",
            DdlCommand::CreateCluster(_) => "CreateClusterStep",
            DdlCommand::DropCluster(_) => "DropClusterStep",
            DdlCommand::CreateIndex(_) => "CreateIndexStep",
            DdlCommand::DropIndex(_) => "DropIndexStep",
            DdlCommand::CreateSequence(_) => "CreateSequenceStep",
            DdlCommand::DropSequence(_) => "DropSequenceStep",
            DdlCommand::CreateUser(_) => "CreateUserStep",
            DdlCommand::DropUser(_) => "DropUserStep",
            DdlCommand::CreateSecurityPolicy(_) => "CreateSecurityPolicyStep",
            DdlCommand::DropSecurityPolicy(_) => "DropSecurityPolicyStep",
            DdlCommand::Sleep(_) => "SleepStep",
            DdlCommand::OptimizeDatabase => "OptimizeDatabaseStep",
        }
    }

    pub fn details(&self) -> Option<String> {
        match &self.command {
            DdlCommand::CreateClass(c) => Some(c.name.clone()),
            DdlCommand::DropClass(c) => Some(c.name.clone()),
            DdlCommand::CreateProperty(c) => Some(format!("{}.{}", c.class, c.name)),
            DdlCommand::DropProperty(c) => Some(format!("{}.{}", c.class, c.name)),
            DdlCommand::CreateCluster(c) => Some(c.name.clone()),
            DdlCommand::DropCluster(c) => Some(c.cluster.to_string()),
            DdlCommand::CreateIndex(c) => Some(format!("{} on {}({})", c.name, c.class, c.fields.join(", "))),
            DdlCommand::DropIndex(c) => Some(c.name.clone()),
            DdlCommand::CreateSequence(c) => Some(c.name.clone()),
            DdlCommand::DropSequence(c) => Some(c.name.clone()),
            DdlCommand::CreateUser(c) => Some(c.name.clone()),
            DdlCommand::DropUser(c) => Some(c.name.clone()),
            DdlCommand::CreateSecurityPolicy(c) => Some(c.name.clone()),
            DdlCommand::DropSecurityPolicy(c) => Some(c.name.clone()),
            DdlCommand::Sleep(c) => Some(format!("{} ms", c.millis)),
            DdlCommand::OptimizeDatabase => None,
        }
    }

    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        let rows = match &self.command {
            DdlCommand::CreateClass(c) => create_class(c, ctx)?,
            DdlCommand::DropClass(c) => drop_class(c, ctx)?,
            DdlCommand::CreateProperty(c) => create_property(c, ctx)?,
            DdlCommand::DropProperty(c) => drop_property(c, ctx)?,
            DdlCommand::CreateCluster(c) => create_cluster(c, ctx)?,
            DdlCommand::DropCluster(c) => drop_cluster(c, ctx)?,
            DdlCommand::CreateIndex(c) => create_index(c, ctx)?,
            DdlCommand::DropIndex(c) => drop_index(c, ctx)?,
            DdlCommand::CreateSequence(c) => create_sequence(c, ctx)?,
            DdlCommand::DropSequence(c) => drop_sequence(c, ctx)?,
            DdlCommand::CreateUser(c) => create_user(c, ctx)?,
            DdlCommand::DropUser(c) => drop_user(c, ctx)?,
            DdlCommand::CreateSecurityPolicy(c) => create_policy(c, ctx)?,
            DdlCommand::DropSecurityPolicy(c) => drop_policy(c, ctx)?,
            DdlCommand::Sleep(c) => sleep(c, ctx)?,
            DdlCommand::OptimizeDatabase => optimize_database(ctx)?,
        };
        if let Some(operation) = rows.first().and_then(|row| row.property("operation")) {
            info!(step = self.name(), operation = %operation, "command executed");
        }
        Ok(ExecutionStream::from_rows(rows))
    }
}

fn create_class(c: &CreateClassStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    if c.if_not_exists && session.schema().get_class(&c.name)?.is_some() {
        return Ok(Vec::new());
    }
    let def = session.create_class(&c.name, c.superclasses.clone(), c.is_abstract)?;
    Ok(vec![info_row("create class", &[("className", Value::from(def.name))])])
}

fn drop_class(c: &DropClassStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    let Some(def) = session.schema().get_class(&c.name)? else {
        if c.if_exists {
            return Ok(Vec::new());
        }
        return Err(ExecutorError::command(format!("class '{}' not found", c.name)));
    };
    let graph = session.schema().is_subclass_of(&def.name, "V")? || session.schema().is_subclass_of(&def.name, "E")?;
    if graph && !c.unsafe_drop {
        let clusters = session.schema().polymorphic_cluster_ids(&def.name)?;
        if session.storage().count_class(&clusters)? > 0 {
            return Err(ExecutorError::command(format!(
                "class '{}' is a vertex or edge class with records; use UNSAFE to drop it",
                def.name
            )));
        }
    }
    session.drop_class(&def.name)?;
    Ok(vec![info_row("drop class", &[("className", Value::from(def.name))])])
}

fn create_property(c: &CreatePropertyStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    let class = session.schema().require_class(&c.class)?;
    if class.own_property(&c.name).is_some() {
        if c.if_not_exists {
            return Ok(Vec::new());
        }
        return Err(ExecutorError::command(format!(
            "property '{}.{}' already exists",
            class.name, c.name
        )));
    }
    let property = PropertyDef {
        name: c.name.clone(),
        property_type: c.property_type,
        linked_class: c.linked_class.clone(),
        mandatory: c.mandatory,
        not_null: c.not_null,
    };
    session.create_property(&class.name, property)?;
    Ok(vec![info_row(
        "create property",
        &[("className", Value::from(class.name)), ("propertyName", Value::from(c.name.as_str()))],
    )])
}

fn drop_property(c: &DropPropertyStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    let class = session.schema().require_class(&c.class)?;
    if class.own_property(&c.name).is_none() {
        if c.if_exists {
            return Ok(Vec::new());
        }
        return Err(ExecutorError::command(format!(
            "property '{}.{}' not found",
            class.name, c.name
        )));
    }
    let dependent = session.dependent_indexes(&class.name, &c.name)?;
    if !dependent.is_empty() && !c.force {
        let names: Vec<&str> = dependent.iter().map(|d| d.name.as_str()).collect();
        return Err(ExecutorError::command(format!(
            "property '{}.{}' is used by indexes [{}]; use FORCE to drop them too",
            class.name,
            c.name,
            names.join(", ")
        )));
    }
    let mut dropped = Vec::with_capacity(dependent.len());
    let outcome = dependent
        .iter()
        .try_for_each(|index| -> DatabaseResult<()> {
            session.drop_index(&index.name)?;
            dropped.push(index.clone());
            Ok(())
        })
        .and_then(|()| session.drop_property(&class.name, &c.name));
    if let Err(err) = outcome {
        restore_indexes(session, &dropped);
        return Err(err.into());
    }

    let mut rows: Vec<QueryResult> = dropped
        .iter()
        .map(|index| info_row("drop index", &[("indexName", Value::from(index.name.as_str()))]))
        .collect();
    rows.push(info_row(
        "drop property",
        &[("className", Value::from(class.name)), ("propertyName", Value::from(c.name.as_str()))],
    ));
    Ok(rows)
}

/// Recreates and refills indexes dropped by a command that then failed
fn restore_indexes(session: &DatabaseSession, dropped: &[IndexDefinition]) {
    for def in dropped {
        if let Err(err) = session.create_index(def.clone()) {
            warn!(index = %def.name, error = %err, "index could not be restored");
        }
    }
}

fn create_cluster(c: &CreateClusterStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    if c.if_not_exists && session.storage().cluster_id(&c.name)?.is_some() {
        return Ok(Vec::new());
    }
    let id = session.create_cluster(&c.name, c.id)?;
    Ok(vec![info_row(
        "create cluster",
        &[("clusterName", Value::from(c.name.as_str())), ("clusterId", Value::Int(id as i32))],
    )])
}

fn drop_cluster(c: &DropClusterStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    let id = match &c.cluster {
        ClusterRef::Id(id) => session.storage().clusters()?.iter().any(|info| info.id == *id).then_some(*id),
        ClusterRef::Name(name) => session.storage().cluster_id(name)?,
    };
    let Some(id) = id else {
        if c.if_exists {
            return Ok(Vec::new());
        }
        return Err(ExecutorError::command(format!("cluster '{}' not found", c.cluster)));
    };
    if let Some(owner) = session.schema().class_of_cluster(id)? {
        return Err(ExecutorError::command(format!(
            "cluster {} belongs to class '{}'",
            c.cluster, owner.name
        )));
    }
    session.drop_cluster(id)?;
    Ok(vec![info_row("drop cluster", &[("clusterId", Value::Int(id as i32))])])
}

fn create_index(c: &CreateIndexStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    if c.if_not_exists && session.indexes().get_index(&c.name)?.is_some() {
        return Ok(Vec::new());
    }
    let class = session.schema().require_class(&c.class)?;
    let mut key_types = Vec::with_capacity(c.fields.len());
    for field in &c.fields {
        let declared = session.schema().property(&class.name, field)?;
        key_types.push(declared.map_or(PropertyType::Any, |p| p.property_type));
    }
    let mut definition = IndexDefinition::new(c.name.as_str(), class.name.as_str(), c.fields.clone(), c.index_type)
        .with_key_types(key_types);
    if let Some(by) = c.by {
        definition = definition.with_map_by(by);
    }
    let entries = session.create_index(definition)?;
    Ok(vec![info_row(
        "create index",
        &[("indexName", Value::from(c.name.as_str())), ("totalIndexed", Value::Long(entries as i64))],
    )])
}

fn drop_index(c: &DropIndexStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    if c.if_exists && session.indexes().get_index(&c.name)?.is_none() {
        return Ok(Vec::new());
    }
    session.drop_index(&c.name)?;
    Ok(vec![info_row("drop index", &[("indexName", Value::from(c.name.as_str()))])])
}

fn create_sequence(c: &CreateSequenceStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let metadata = ctx.session().metadata();
    if c.if_not_exists && metadata.sequence(&c.name)?.is_some() {
        return Ok(Vec::new());
    }
    let mut def = SequenceDef::new(c.name.as_str());
    def.sequence_type = c.sequence_type;
    if let Some(start) = c.start {
        def.start = start;
    }
    if let Some(increment) = c.increment {
        def.increment = increment;
    }
    if let Some(cache) = c.cache {
        def.cache = cache;
    }
    metadata.create_sequence(def)?;
    Ok(vec![info_row("create sequence", &[("name", Value::from(c.name.as_str()))])])
}

fn drop_sequence(c: &DropSequenceStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let metadata = ctx.session().metadata();
    if c.if_exists && metadata.sequence(&c.name)?.is_none() {
        return Ok(Vec::new());
    }
    metadata.drop_sequence(&c.name)?;
    Ok(vec![info_row("drop sequence", &[("name", Value::from(c.name.as_str()))])])
}

fn create_user(c: &CreateUserStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    ctx.session()
        .metadata()
        .create_user(&c.name, &c.password, c.roles.clone())?;
    let roles: Vec<Value> = c.roles.iter().map(|r| Value::from(r.as_str())).collect();
    Ok(vec![info_row(
        "create user",
        &[("name", Value::from(c.name.as_str())), ("roles", Value::List(roles))],
    )])
}

fn drop_user(c: &DropUserStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let metadata = ctx.session().metadata();
    if c.if_exists && metadata.user(&c.name)?.is_none() {
        return Ok(Vec::new());
    }
    metadata.drop_user(&c.name)?;
    Ok(vec![info_row("drop user", &[("name", Value::from(c.name.as_str()))])])
}

fn create_policy(c: &CreateSecurityPolicyStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    ctx.session().metadata().create_policy(SecurityPolicy {
        name: c.name.clone(),
        rules: c.rules.clone(),
    })?;
    Ok(vec![info_row("create security policy", &[("name", Value::from(c.name.as_str()))])])
}

fn drop_policy(c: &DropSecurityPolicyStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let metadata = ctx.session().metadata();
    if c.if_exists && metadata.policy(&c.name)?.is_none() {
        return Ok(Vec::new());
    }
    metadata.drop_policy(&c.name)?;
    Ok(vec![info_row("drop security policy", &[("name", Value::from(c.name.as_str()))])])
}

/// Sleeps in short slices so that a statement deadline interrupts it
fn sleep(c: &SleepStatement, ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let mut remaining = Duration::from_millis(c.millis);
    while !remaining.is_zero() {
        ctx.check_deadline()?;
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
    ctx.check_deadline()?;
    Ok(vec![info_row("sleep", &[("millis", Value::Long(c.millis as i64))])])
}

fn optimize_database(ctx: &ExecutionContext) -> ExecResult<Vec<QueryResult>> {
    let session = ctx.session();
    let mut rebuilt = 0i64;
    let mut entries = 0i64;
    for index in session.indexes().indexes()? {
        entries += session.rebuild_index(&index.name)? as i64;
        rebuilt += 1;
    }
    Ok(vec![info_row(
        "optimize database",
        &[("indexesRebuilt", Value::Long(rebuilt)), ("entries", Value::Long(entries))],
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::executor::config::EngineConfig;
    use crate::executor::errors::ExecutorErrorCode;
    use crate::index::IndexType;
    use std::sync::Arc;

    fn ctx() -> ExecutionContext {
        let db = Database::new("test").unwrap();
        ExecutionContext::new(db.session(), Arc::new(EngineConfig::default()))
    }

    fn run(ctx: &mut ExecutionContext, command: DdlCommand) -> ExecResult<Vec<QueryResult>> {
        CommandStep::new(command).start(ctx)?.collect_all(ctx)
    }

    fn create_class(name: &str) -> DdlCommand {
        DdlCommand::CreateClass(CreateClassStatement {
            name: name.to_string(),
            superclasses: Vec::new(),
            is_abstract: false,
            if_not_exists: false,
        })
    }

    #[test]
    fn test_create_class_reports_operation() {
        let mut ctx = ctx();
        let rows = run(&mut ctx, create_class("Person")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].property("operation"), Some(&Value::from("create class")));
        assert!(ctx.session().schema().get_class("Person").unwrap().is_some());
    }

    #[test]
    fn test_drop_missing_class() {
        let mut ctx = ctx();
        let stmt = DropClassStatement {
            name: "Nope".into(),
            if_exists: true,
            unsafe_drop: false,
        };
        assert!(run(&mut ctx, DdlCommand::DropClass(stmt.clone())).unwrap().is_empty());

        let err = run(&mut ctx, DdlCommand::DropClass(DropClassStatement { if_exists: false, ..stmt })).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::VqlCommandExecution);
    }

    #[test]
    fn test_drop_property_with_dependent_index() {
        let mut ctx = ctx();
        run(&mut ctx, create_class("T")).unwrap();
        run(
            &mut ctx,
            DdlCommand::CreateProperty(CreatePropertyStatement {
                class: "T".into(),
                name: "name".into(),
                property_type: PropertyType::String,
                linked_class: None,
                mandatory: false,
                not_null: false,
                if_not_exists: false,
            }),
        )
        .unwrap();
        run(
            &mut ctx,
            DdlCommand::CreateIndex(CreateIndexStatement {
                name: "T.name".into(),
                class: "T".into(),
                fields: vec!["name".into()],
                index_type: IndexType::NotUnique,
                by: None,
                if_not_exists: false,
            }),
        )
        .unwrap();

        let drop = DropPropertyStatement {
            class: "T".into(),
            name: "name".into(),
            if_exists: false,
            force: false,
        };
        let err = run(&mut ctx, DdlCommand::DropProperty(drop.clone())).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::VqlCommandExecution);
        assert!(ctx.session().indexes().get_index("T.name").unwrap().is_some());

        let rows = run(&mut ctx, DdlCommand::DropProperty(DropPropertyStatement { force: true, ..drop })).unwrap();
        let ops: Vec<_> = rows.iter().map(|r| r.property("operation").cloned()).collect();
        assert_eq!(
            ops,
            vec![Some(Value::from("drop index")), Some(Value::from("drop property"))]
        );
        assert!(ctx.session().indexes().get_index("T.name").unwrap().is_none());
    }

    #[test]
    fn test_restore_indexes_refills_entries() {
        let mut ctx = ctx();
        run(&mut ctx, create_class("T")).unwrap();
        let mut props = Properties::new();
        props.set("name", "a");
        ctx.session().create_record("T", None, props).unwrap();
        let def = IndexDefinition::new("T.name", "T", vec!["name".to_string()], IndexType::NotUnique);
        ctx.session().create_index(def.clone()).unwrap();
        ctx.session().drop_index("T.name").unwrap();

        restore_indexes(ctx.session(), &[def]);
        let indexes = ctx.session().indexes();
        assert!(indexes.get_index("T.name").unwrap().is_some());
        assert_eq!(indexes.size("T.name").unwrap(), 1);
    }

    #[test]
    fn test_sleep_honours_deadline() {
        let mut ctx = ctx();
        ctx.set_statement_timeout(Duration::from_millis(20));
        let err = run(&mut ctx, DdlCommand::Sleep(SleepStatement { millis: 2_000 })).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::VqlTimeout);
    }

    #[test]
    fn test_create_sequence_if_not_exists() {
        let mut ctx = ctx();
        let stmt = CreateSequenceStatement {
            name: "s".into(),
            sequence_type: Default::default(),
            start: Some(10),
            increment: Some(5),
            cache: None,
            if_not_exists: true,
        };
        assert_eq!(run(&mut ctx, DdlCommand::CreateSequence(stmt.clone())).unwrap().len(), 1);
        assert!(run(&mut ctx, DdlCommand::CreateSequence(stmt)).unwrap().is_empty());
        assert_eq!(ctx.session().metadata().next_value("s").unwrap(), 15);
    }
}
