//! Pivot rows of many-to-many relations
//!
//! A pivot row has no primary key of its own. It is addressed by the pair of
//! foreign keys, plus the morph type column for polymorphic pivots.

use std::sync::Arc;

use crate::backends::Row;
use crate::database::Database;
use crate::error::ModelResult;
use crate::grammar::{record_from_row, Record};
use crate::model::{Entity, EntityType};
use crate::query::Query;

use super::traits::MorphConstraint;

#[derive(Debug, Clone)]
pub struct Pivot {
    entity: Entity,
    foreign_key: String,
    other_key: String,
    morph: Option<MorphConstraint>,
}

impl Pivot {
    pub fn new(table: &str, attributes: Row, exists: bool, foreign_key: &str, other_key: &str) -> Self {
        let entity_type = Arc::new(EntityType::pivot(table));
        let entity = if exists {
            Entity::from_row(entity_type, attributes)
        } else {
            Entity::with_attributes(entity_type, attributes)
        };
        Self {
            entity,
            foreign_key: foreign_key.to_string(),
            other_key: other_key.to_string(),
            morph: None,
        }
    }

    /// Morph pivot: also keyed by `morph_type = class`
    pub fn with_morph(mut self, morph_type: &str, class: &str) -> Self {
        self.entity.force_set(morph_type, class.into());
        self.morph = Some(MorphConstraint {
            column: morph_type.to_string(),
            class: class.to_string(),
        });
        self
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn table(&self) -> &str {
        self.entity.table()
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn other_key(&self) -> &str {
        &self.other_key
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<serde_json::Value>) -> ModelResult<()> {
        self.entity.set_attribute(key, value)
    }

    /// Whether the pivot table carries timestamp columns
    pub fn has_timestamp_attributes(&self) -> bool {
        self.entity.get_attribute("created_at").is_some()
    }

    /// Query addressing this pivot row
    pub fn key_query(&self) -> Query {
        let query = Query::table(self.table())
            .where_eq(&self.foreign_key, self.entity.get(&self.foreign_key))
            .where_eq(&self.other_key, self.entity.get(&self.other_key));
        match &self.morph {
            Some(morph) => query.where_eq(&morph.column, morph.class.as_str()),
            None => query,
        }
    }

    /// Insert the row, or update its changed columns
    pub async fn save(&mut self, db: &Database) -> ModelResult<()> {
        if self.has_timestamp_attributes() {
            let now = db.fresh_timestamp();
            if !self.entity.exists() {
                self.entity.force_set("created_at", now.clone());
            }
            self.entity.force_set("updated_at", now);
        }

        if self.entity.exists() {
            let dirty = self.entity.get_dirty();
            if !dirty.is_empty() {
                db.update(&self.key_query(), &record_from_row(&dirty)).await?;
            }
        } else {
            let record: Record = record_from_row(self.entity.attributes());
            db.insert(&Query::table(self.table()), &[record]).await?;
            self.entity.set_exists(true);
        }

        self.entity.sync_original();
        Ok(())
    }

    /// Delete the row; returns the affected count
    pub async fn delete(&mut self, db: &Database) -> ModelResult<u64> {
        let affected = db.delete(&self.key_query()).await?;
        self.entity.set_exists(false);
        Ok(affected)
    }
}
