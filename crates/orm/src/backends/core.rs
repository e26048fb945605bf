//! Core Database Backend Traits
//!
//! The ORM never talks to a driver directly. Compiled SQL plus its ordered
//! bindings are handed to a [`Connection`], which returns rows as JSON maps
//! or an affected-row count.

use async_trait::async_trait;
use serde_json::{Map, Value};

/// A fetched row, keyed by column name
pub type Row = Map<String, Value>;

/// Row-fetch collaborator used by every compiled statement
///
/// Errors are reported as `anyhow::Error` and travel through the ORM
/// unchanged as [`crate::error::ModelError::Driver`].
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a query and return the result rows
    async fn select(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<Vec<Row>>;

    /// Run a statement and return the affected rows count
    async fn affecting_statement(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<u64>;

    /// Run an insert and return the generated key, if the driver reports one
    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> anyhow::Result<Option<Value>> {
        self.affecting_statement(sql, bindings).await?;
        Ok(None)
    }
}

/// SQL dialect, used to pick the identifier quote character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    #[default]
    SQLite,
}

impl SqlDialect {
    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL => '`',
            SqlDialect::SQLite => '"',
        }
    }

    /// Expression producing a random ordering
    pub fn random_function(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => "RANDOM()",
            SqlDialect::MySQL => "RAND()",
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgres"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            _ => Err(format!("Unsupported SQL dialect: {}", s)),
        }
    }
}
