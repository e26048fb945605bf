//! Entity persistence: save, delete, restore and relation access

use serde_json::Value;
use tracing::debug;

use super::builder::ModelQuery;
use super::entity::{Entity, RelationValue};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::grammar::{record_from_row, Record};
use crate::query::QueryValue;
use crate::relationships::relation_for;

impl Entity {
    /// Unscoped query addressing this entity by primary key
    fn key_query(&self, db: &Database) -> ModelResult<ModelQuery> {
        let key = self.get_key_value();
        if key.is_null() {
            return Err(ModelError::Logic(format!(
                "{} has no primary key value",
                self.type_name()
            )));
        }
        let column = self.entity_type().qualified_key_name();
        Ok(ModelQuery::new(db.registry().clone(), self.entity_type().clone())
            .without_global_scopes()
            .where_eq(&column, key))
    }

    fn touch_timestamps(&mut self, db: &Database) {
        if !self.entity_type().uses_timestamps() {
            return;
        }
        let now = db.fresh_timestamp();
        let updated_at = self.entity_type().updated_at_column().to_string();
        let created_at = self.entity_type().created_at_column().to_string();

        if !self.get_dirty().contains_key(&updated_at) {
            self.force_set(&updated_at, now.clone());
        }
        if !self.exists() && !self.get_dirty().contains_key(&created_at) {
            self.force_set(&created_at, now);
        }
    }

    /// Insert or update the entity
    ///
    /// Updates write only dirty attributes. Inserts of incrementing types
    /// without a key read the generated key back from the driver.
    pub async fn save(&mut self, db: &Database) -> ModelResult<()> {
        if self.exists() {
            if !self.is_dirty() {
                return Ok(());
            }
            self.touch_timestamps(db);
            let dirty = record_from_row(&self.get_dirty());
            self.key_query(db)?.update(db, dirty).await?;
        } else {
            self.touch_timestamps(db);
            let record = record_from_row(self.attributes());
            let query = db.table(self.table());

            if self.entity_type().incrementing() && self.get_key_value().is_null() {
                let key_name = self.key_name().to_string();
                let mut record = record;
                record.remove(&key_name);
                if let Some(id) = db.insert_get_id(&query, &record).await? {
                    self.force_set(&key_name, id);
                }
            } else {
                db.insert(&query, &[record]).await?;
            }
            self.set_exists(true);
        }

        debug!(model = self.type_name(), key = %self.get_key_value(), "Saved entity");
        self.sync_original();
        Ok(())
    }

    /// Delete the entity; soft-deleting types only set the deletion column
    pub async fn delete(&mut self, db: &Database) -> ModelResult<()> {
        if !self.exists() {
            return Ok(());
        }

        if self.entity_type().soft_deletes() {
            let column = self.entity_type().deleted_at_column().to_string();
            let now = db.fresh_timestamp();
            let mut values = Record::new();
            values.insert(column.clone(), QueryValue::from(now.clone()));
            let updated_at = self
                .entity_type()
                .uses_timestamps()
                .then(|| self.entity_type().updated_at_column().to_string());
            if let Some(updated_at) = &updated_at {
                values.insert(updated_at.clone(), QueryValue::from(now.clone()));
            }
            self.key_query(db)?.update(db, values).await?;

            if let Some(updated_at) = &updated_at {
                self.force_set(updated_at, now.clone());
                self.sync_original_attribute(updated_at);
            }
            self.force_set(&column, now);
            self.sync_original_attribute(&column);
        } else {
            db.delete(&self.key_query(db)?.to_base()).await?;
            self.set_exists(false);
        }
        Ok(())
    }

    /// Delete the row for real, even for soft-deleting types
    pub async fn force_delete(&mut self, db: &Database) -> ModelResult<()> {
        if !self.entity_type().soft_deletes() {
            return self.delete(db).await;
        }
        if !self.exists() {
            return Ok(());
        }
        self.key_query(db)?.force_delete(db).await?;
        self.set_exists(false);
        Ok(())
    }

    /// Clear the deletion column of a soft-deleted entity
    pub async fn restore(&mut self, db: &Database) -> ModelResult<()> {
        if !self.entity_type().soft_deletes() {
            return Err(ModelError::Logic(format!(
                "{} does not use soft deletes",
                self.type_name()
            )));
        }
        let column = self.entity_type().deleted_at_column().to_string();
        self.force_set(&column, Value::Null);
        self.set_exists(true);
        self.save(db).await
    }

    /// Reload the entity's row, including a trashed one
    pub async fn fresh(&self, db: &Database) -> ModelResult<Option<Entity>> {
        if !self.exists() {
            return Ok(None);
        }
        self.key_query(db)?.first(db).await
    }

    /// Query and return relation `name` without caching it
    pub async fn related(&self, db: &Database, name: &str) -> ModelResult<RelationValue> {
        let relation = relation_for(db.registry(), self, name)?;
        relation.get_results(db).await
    }

    /// Eager load relations onto this entity, nested names included
    pub async fn load(&mut self, db: &Database, relations: &[&str]) -> ModelResult<()> {
        let query = ModelQuery::new(db.registry().clone(), self.entity_type().clone()).with(relations);
        query.eager_load_relations(db, std::slice::from_mut(self)).await
    }
}
