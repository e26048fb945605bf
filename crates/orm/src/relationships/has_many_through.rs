//! Has-many-through: far parent -> intermediate ("through") -> related
//!
//! The related query joins the through table on `through.key = related.second_key`
//! and selects `through.first_key` so results can be matched to far parents.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::metadata::RelationshipType;
use super::traits::{group_by_key, relation_count_hash, unique_keys, EagerConstraint, EagerLoad, Relation};
use crate::collection::Collection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{Entity, EntityType, ModelQuery, RelationValue};

#[derive(Debug, Clone)]
pub struct HasManyThrough {
    name: String,
    query: ModelQuery,
    through: Arc<EntityType>,
    first_key: String,
    second_key: String,
    local_key: String,
    parent: Option<Entity>,
}

impl HasManyThrough {
    pub fn new(
        name: &str,
        query: ModelQuery,
        through: Arc<EntityType>,
        first_key: &str,
        second_key: &str,
        local_key: &str,
    ) -> Self {
        let related = query.entity_type().clone();
        let query = Self::set_join(query, &related, &through, second_key, first_key);
        Self {
            name: name.to_string(),
            query,
            through,
            first_key: first_key.to_string(),
            second_key: second_key.to_string(),
            local_key: local_key.to_string(),
            parent: None,
        }
    }

    /// Join the through table onto a query against `related`
    fn set_join(query: ModelQuery, related: &EntityType, through: &EntityType, second_key: &str, first_key: &str) -> ModelQuery {
        let second = related.qualify_column(second_key);
        let columns = vec![format!("{}.*", related.table()), through.qualify_column(first_key)];
        let query = query.tap(|q| q.join(through.table(), &through.qualified_key_name(), "=", &second).select(columns));

        if through.soft_deletes() {
            query.where_null(&through.qualified_deleted_at_column())
        } else {
            query
        }
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    fn qualified_first_key(&self) -> String {
        self.through.qualify_column(&self.first_key)
    }
}

#[async_trait]
impl Relation for HasManyThrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn relationship_type(&self) -> RelationshipType {
        RelationshipType::HasManyThrough
    }

    fn constrain(&mut self, constraint: EagerConstraint) {
        self.query = constraint(self.query.clone());
    }

    fn with(&mut self, loads: Vec<EagerLoad>) {
        self.query = self.query.clone().with_loads(loads);
    }

    fn add_constraints(&mut self, parent: &Entity) {
        let first_key = self.qualified_first_key();
        self.query = self.query.clone().where_eq(&first_key, parent.get(&self.local_key));
        self.parent = Some(parent.clone());
    }

    fn add_eager_constraints(&mut self, models: &[Entity]) {
        let first_key = self.qualified_first_key();
        self.query = self
            .query
            .clone()
            .where_in(&first_key, unique_keys(models, &self.local_key));
    }

    fn init_relation(&self, models: &mut [Entity], relation: &str) {
        for model in models.iter_mut() {
            model.set_relation(relation, RelationValue::Many(Collection::empty()));
        }
    }

    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str) {
        let dictionary = group_by_key(results, &self.first_key);
        for model in models.iter_mut() {
            if let Some(matches) = model.key_of(&self.local_key).and_then(|key| dictionary.get(&key)) {
                model.set_relation(relation, RelationValue::Many(Collection::new(matches.clone())));
            }
        }
    }

    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue> {
        match &self.parent {
            Some(parent) if !parent.get(&self.local_key).is_null() => Ok(RelationValue::Many(self.query.get(db).await?)),
            _ => Ok(RelationValue::Many(Collection::empty())),
        }
    }

    async fn get_eager(&self, db: &Database) -> ModelResult<Collection> {
        debug!(relation = %self.name, through = self.through.name(), "Eager loading has-many-through relation");
        self.query.get(db).await
    }

    fn existence_query(&self, parent: &EntityType) -> ModelResult<ModelQuery> {
        let related = self.query.entity_type().clone();
        let parent_key = parent.qualify_column(&self.local_key);

        let query = if related.table() == parent.table() {
            let hash = relation_count_hash();
            let from = format!("{} as {}", related.table(), hash);
            let alias = Arc::new(related.aliased(&hash));
            let query = ModelQuery::new(self.query.registry().clone(), alias.clone()).tap(|q| q.from(&from));
            Self::set_join(query, &alias, &self.through, &self.second_key, &self.first_key)
        } else {
            self.query.clone()
        };

        Ok(query.where_column(&self.qualified_first_key(), "=", &parent_key))
    }
}
