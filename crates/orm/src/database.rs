//! Database context
//!
//! A [`Database`] bundles the row-fetch [`Connection`] with the grammar,
//! configuration, clock and relationship registry every query needs. It is
//! cheap to clone and is passed by reference into all executing calls.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backends::{Connection, Row};
use crate::config::OrmConfig;
use crate::error::ModelResult;
use crate::grammar::{insert_bindings, update_bindings, Grammar, Record};
use crate::model::{Model, ModelQuery};
use crate::query::Query;
use crate::relationships::RelationshipRegistry;
use crate::timestamps::{fresh_timestamp, Clock, SystemClock};

#[derive(Clone)]
pub struct Database {
    connection: Arc<dyn Connection>,
    grammar: Grammar,
    config: Arc<OrmConfig>,
    clock: Arc<dyn Clock>,
    registry: RelationshipRegistry,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("grammar", &self.grammar)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Database {
    /// Create a context, validating the configuration and the registry
    pub fn new(connection: Arc<dyn Connection>, config: OrmConfig, registry: RelationshipRegistry) -> ModelResult<Self> {
        config.validate()?;
        registry.validate()?;

        Ok(Self {
            connection,
            grammar: Grammar::new(&config),
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            registry,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Entity query for a registered type name
    pub fn query(&self, model_name: &str) -> ModelResult<ModelQuery> {
        Ok(ModelQuery::new(self.registry.clone(), self.registry.entity_type(model_name)?))
    }

    /// Entity query for a typed model
    pub fn query_for<M: Model>(&self) -> ModelResult<ModelQuery> {
        self.query(M::entity_name())
    }

    /// Plain query against a table
    pub fn table(&self, table: &str) -> Query {
        Query::table(table)
    }

    /// Current time formatted for storage
    pub fn fresh_timestamp(&self) -> Value {
        fresh_timestamp(self.clock.as_ref(), &self.config)
    }

    pub async fn select(&self, query: &Query) -> ModelResult<Vec<Row>> {
        let sql = self.grammar.compile_select(query)?;
        self.select_sql(&sql, &query.get_bindings()).await
    }

    pub async fn select_sql(&self, sql: &str, bindings: &[Value]) -> ModelResult<Vec<Row>> {
        debug!(sql = %sql, bindings = bindings.len(), "Executing select");
        Ok(self.connection.select(sql, bindings).await?)
    }

    /// Run a statement and return the affected rows count
    pub async fn statement(&self, sql: &str, bindings: &[Value]) -> ModelResult<u64> {
        debug!(sql = %sql, bindings = bindings.len(), "Executing statement");
        Ok(self.connection.affecting_statement(sql, bindings).await?)
    }

    pub async fn insert(&self, query: &Query, records: &[Record]) -> ModelResult<u64> {
        let sql = self.grammar.compile_insert(query, records)?;
        self.statement(&sql, &insert_bindings(records)).await
    }

    /// Insert one record and return the key generated by the driver
    pub async fn insert_get_id(&self, query: &Query, record: &Record) -> ModelResult<Option<Value>> {
        let records = std::slice::from_ref(record);
        let sql = self.grammar.compile_insert(query, records)?;
        let bindings = insert_bindings(records);
        debug!(sql = %sql, bindings = bindings.len(), "Executing insert");
        Ok(self.connection.insert_get_id(&sql, &bindings).await?)
    }

    pub async fn update(&self, query: &Query, values: &Record) -> ModelResult<u64> {
        let sql = self.grammar.compile_update(query, values)?;
        self.statement(&sql, &update_bindings(query, values)).await
    }

    pub async fn delete(&self, query: &Query) -> ModelResult<u64> {
        let sql = self.grammar.compile_delete(query)?;
        self.statement(&sql, &query.where_bindings()).await
    }

    pub async fn truncate(&self, query: &Query) -> ModelResult<()> {
        let sql = self.grammar.compile_truncate(query)?;
        self.statement(&sql, &[]).await?;
        Ok(())
    }

    /// Whether the query matches any row
    pub async fn exists(&self, query: &Query) -> ModelResult<bool> {
        let sql = self.grammar.compile_exists(query)?;
        let rows = self.select_sql(&sql, &query.get_bindings()).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("exists"))
            .map(|value| match value {
                Value::Bool(flag) => *flag,
                Value::Number(number) => number.as_i64().map(|n| n != 0).unwrap_or(false),
                Value::String(text) => text == "1" || text.eq_ignore_ascii_case("true") || text == "t",
                _ => false,
            })
            .unwrap_or(false))
    }

    pub async fn savepoint(&self, name: &str) -> ModelResult<()> {
        let sql = self.grammar.compile_savepoint(name)?;
        self.statement(&sql, &[]).await?;
        Ok(())
    }

    pub async fn rollback_to_savepoint(&self, name: &str) -> ModelResult<()> {
        let sql = self.grammar.compile_savepoint_rollback(name)?;
        self.statement(&sql, &[]).await?;
        Ok(())
    }
}
