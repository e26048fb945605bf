//! BelongsTo relationship - the owner holds a foreign key to the related row

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::metadata::RelationshipType;
use super::traits::{relation_count_hash, unique_keys, EagerConstraint, EagerLoad, Relation};
use crate::collection::Collection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{Entity, EntityType, ModelQuery, PrimaryKey, RelationValue};

#[derive(Debug, Clone)]
pub struct BelongsTo {
    name: String,
    query: ModelQuery,
    foreign_key: String,
    other_key: String,
    parent: Option<Entity>,
}

impl BelongsTo {
    pub fn new(name: &str, query: ModelQuery, foreign_key: &str, other_key: &str) -> Self {
        Self {
            name: name.to_string(),
            query,
            foreign_key: foreign_key.to_string(),
            other_key: other_key.to_string(),
            parent: None,
        }
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    fn qualified_other_key(&self) -> String {
        self.query.entity_type().qualify_column(&self.other_key)
    }

    /// Keys to look up for a batch of owners
    ///
    /// When no owner has a foreign key the lookup still needs one value:
    /// `0` for incrementing keys, null otherwise, so the query matches nothing.
    fn eager_keys(&self, models: &[Entity]) -> Vec<Value> {
        let keys = unique_keys(models, &self.foreign_key);
        if !keys.is_empty() {
            return keys;
        }
        if self.query.entity_type().incrementing() {
            vec![Value::from(0)]
        } else {
            vec![Value::Null]
        }
    }

    /// Point `child` at `related` and cache the relation
    pub fn associate(&self, child: &mut Entity, related: &Entity) -> ModelResult<()> {
        child.set_attribute(&self.foreign_key, related.get(&self.other_key))?;
        child.set_relation(&self.name, RelationValue::One(Box::new(related.clone())));
        Ok(())
    }

    /// Clear the foreign key on `child`
    pub fn dissociate(&self, child: &mut Entity) -> ModelResult<()> {
        child.set_attribute(&self.foreign_key, Value::Null)?;
        child.set_relation(&self.name, RelationValue::Null);
        Ok(())
    }
}

#[async_trait]
impl Relation for BelongsTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn relationship_type(&self) -> RelationshipType {
        RelationshipType::BelongsTo
    }

    fn constrain(&mut self, constraint: EagerConstraint) {
        self.query = constraint(self.query.clone());
    }

    fn with(&mut self, loads: Vec<EagerLoad>) {
        self.query = self.query.clone().with_loads(loads);
    }

    fn add_constraints(&mut self, parent: &Entity) {
        let other_key = self.qualified_other_key();
        self.query = self.query.clone().where_eq(&other_key, parent.get(&self.foreign_key));
        self.parent = Some(parent.clone());
    }

    fn add_eager_constraints(&mut self, models: &[Entity]) {
        let other_key = self.qualified_other_key();
        let keys = self.eager_keys(models);
        self.query = self.query.clone().where_in(&other_key, keys);
    }

    fn init_relation(&self, models: &mut [Entity], relation: &str) {
        for model in models.iter_mut() {
            model.set_relation(relation, RelationValue::Null);
        }
    }

    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str) {
        let dictionary: HashMap<PrimaryKey, Entity> = results
            .into_iter()
            .filter_map(|result| result.key_of(&self.other_key).map(|key| (key, result)))
            .collect();

        for model in models.iter_mut() {
            if let Some(related) = model.key_of(&self.foreign_key).and_then(|key| dictionary.get(&key)) {
                model.set_relation(relation, RelationValue::One(Box::new(related.clone())));
            }
        }
    }

    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue> {
        match &self.parent {
            Some(parent) if !parent.get(&self.foreign_key).is_null() => Ok(match self.query.first(db).await? {
                Some(model) => RelationValue::One(Box::new(model)),
                None => RelationValue::Null,
            }),
            _ => Ok(RelationValue::Null),
        }
    }

    async fn get_eager(&self, db: &Database) -> ModelResult<Collection> {
        debug!(relation = %self.name, "Eager loading belongs-to relation");
        self.query.get(db).await
    }

    fn existence_query(&self, parent: &EntityType) -> ModelResult<ModelQuery> {
        let related = self.query.entity_type().clone();
        let foreign_key = parent.qualify_column(&self.foreign_key);

        if related.table() == parent.table() {
            let hash = relation_count_hash();
            let from = format!("{} as {}", related.table(), hash);
            let alias = Arc::new(related.aliased(&hash));
            let other_key = alias.qualify_column(&self.other_key);
            return Ok(ModelQuery::new(self.query.registry().clone(), alias)
                .tap(|q| q.from(&from))
                .where_column(&other_key, "=", &foreign_key));
        }

        Ok(self
            .query
            .clone()
            .where_column(&foreign_key, "=", &self.qualified_other_key()))
    }
}
