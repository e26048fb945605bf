//! Model System - entities, entity types and the entity-aware query builder
//!
//! - `entity_type`: per-table metadata shared by every entity of a kind
//! - `entity`: dynamic records with dirty tracking and loaded relations
//! - `primary_key`: normalized key values used for identity and matching
//! - `builder`: `ModelQuery`, scoped queries with eager loading
//! - `persistence`: save / delete / restore on entities
//! - `soft_deletes`: the soft-deleting global scope and its extensions
//! - `core_trait`: typed `Model` structs over entities

pub mod builder;
pub mod core_trait;
pub mod entity;
pub mod entity_type;
mod persistence;
pub mod primary_key;
pub mod soft_deletes;

pub use builder::ModelQuery;
pub use core_trait::Model;
pub use entity::{Entity, RelationValue};
pub use entity_type::EntityType;
pub use primary_key::PrimaryKey;
pub use soft_deletes::{GlobalScope, ScopeExtension};
