//! Testing utilities
//!
//! [`FakeConnection`] answers statements from a queue of scripted responses
//! and records every statement it receives, so query behavior can be
//! asserted without a database.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::backends::{Connection, Row};

/// Scripted answer for the next statement
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Rows(Vec<Row>),
    Affected(u64),
    InsertId(Value),
    Error(String),
}

/// A statement received by the fake connection
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// Connection double answering in FIFO order
///
/// With an empty queue, selects return no rows and statements affect none.
#[derive(Debug, Default)]
pub struct FakeConnection {
    responses: Mutex<VecDeque<FakeResponse>>,
    executed: Mutex<Vec<ExecutedStatement>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build rows from a JSON array of objects; other values are skipped
pub fn rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        Value::Object(row) => vec![row],
        _ => Vec::new(),
    }
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: FakeResponse) -> &Self {
        lock(&self.responses).push_back(response);
        self
    }

    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.push(FakeResponse::Rows(rows))
    }

    /// Queue rows given as a JSON array of objects
    pub fn push_json(&self, value: Value) -> &Self {
        self.push_rows(rows(value))
    }

    pub fn push_affected(&self, count: u64) -> &Self {
        self.push(FakeResponse::Affected(count))
    }

    pub fn push_insert_id(&self, id: impl Into<Value>) -> &Self {
        self.push(FakeResponse::InsertId(id.into()))
    }

    pub fn push_error(&self, message: &str) -> &Self {
        self.push(FakeResponse::Error(message.to_string()))
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        lock(&self.executed).clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        lock(&self.executed).iter().map(|s| s.sql.clone()).collect()
    }

    /// Number of scripted responses not yet consumed
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }

    fn record(&self, sql: &str, bindings: &[Value]) -> Option<FakeResponse> {
        lock(&self.executed).push(ExecutedStatement {
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
        lock(&self.responses).pop_front()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn select(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<Vec<Row>> {
        match self.record(sql, bindings) {
            Some(FakeResponse::Rows(rows)) => Ok(rows),
            Some(FakeResponse::Error(message)) => Err(anyhow::anyhow!(message)),
            _ => Ok(Vec::new()),
        }
    }

    async fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<u64> {
        match self.record(sql, bindings) {
            Some(FakeResponse::Affected(count)) => Ok(count),
            Some(FakeResponse::Rows(rows)) => Ok(rows.len() as u64),
            Some(FakeResponse::Error(message)) => Err(anyhow::anyhow!(message)),
            _ => Ok(0),
        }
    }

    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<Option<Value>> {
        match self.record(sql, bindings) {
            Some(FakeResponse::InsertId(id)) => Ok(Some(id)),
            Some(FakeResponse::Error(message)) => Err(anyhow::anyhow!(message)),
            _ => Ok(None),
        }
    }
}
