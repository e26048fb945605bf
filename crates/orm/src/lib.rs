//! # fluent-orm: Active-record ORM core
//!
//! Entities, a structured query builder compiled to parameterized SQL,
//! relationship definitions with lazy and eager loading, soft deletes and
//! length-aware pagination.
//!
//! The crate never owns a driver. Compiled SQL and its ordered bindings go
//! through the [`Connection`] trait, which returns rows as JSON maps.

pub mod backends;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod grammar;
pub mod model;
pub mod pagination;
pub mod query;
pub mod relationships;
pub mod testing;
pub mod timestamps;

// Re-export core traits and types
pub use backends::{Connection, Row, SqlDialect};
pub use collection::{Collection, Dictionary};
pub use config::OrmConfig;
pub use database::Database;
pub use error::*;
pub use grammar::Grammar;
pub use model::{Entity, EntityType, GlobalScope, Model, ModelQuery, PrimaryKey, RelationValue, ScopeExtension};
pub use pagination::LengthAwarePaginator;
pub use query::types::*;
pub use query::{JoinClause, Query};
pub use relationships::{
    EagerLoad, Relation, RelationshipMetadata, RelationshipRegistry, RelationshipType,
};
pub use timestamps::{Clock, FixedClock, SystemClock};
