//! Has-one / has-many relations and their polymorphic variants
//!
//! The related table carries a foreign key pointing at the parent's local
//! key. Morph-one and morph-many add a `type column = morph class` predicate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::metadata::RelationshipType;
use super::traits::{group_by_key, relation_count_hash, unique_keys, EagerConstraint, EagerLoad, MorphConstraint, Relation};
use crate::collection::Collection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{Entity, EntityType, ModelQuery, RelationValue};

#[derive(Debug, Clone)]
pub struct HasOneOrMany {
    name: String,
    relationship_type: RelationshipType,
    query: ModelQuery,
    foreign_key: String,
    local_key: String,
    morph: Option<MorphConstraint>,
    parent: Option<Entity>,
}

impl HasOneOrMany {
    pub fn new(name: &str, relationship_type: RelationshipType, query: ModelQuery, foreign_key: &str, local_key: &str) -> Self {
        Self {
            name: name.to_string(),
            relationship_type,
            query,
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
            morph: None,
            parent: None,
        }
    }

    /// Restrict to rows whose `morph_type` column holds `class`
    pub fn morph(mut self, morph_type: &str, class: &str) -> Self {
        self.morph = Some(MorphConstraint {
            column: morph_type.to_string(),
            class: class.to_string(),
        });
        self
    }

    fn is_one(&self) -> bool {
        matches!(self.relationship_type, RelationshipType::HasOne | RelationshipType::MorphOne)
    }

    pub fn qualified_foreign_key(&self) -> String {
        self.query.entity_type().qualify_column(&self.foreign_key)
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    fn empty(&self) -> RelationValue {
        if self.is_one() {
            RelationValue::Null
        } else {
            RelationValue::Many(Collection::empty())
        }
    }

    fn with_morph_constraint(&self, query: ModelQuery) -> ModelQuery {
        match &self.morph {
            Some(morph) => {
                let column = query.entity_type().qualify_column(&morph.column);
                query.where_eq(&column, morph.class.clone())
            }
            None => query,
        }
    }

    /// Point `child` at `parent` and save it
    pub async fn save(&self, db: &Database, parent: &Entity, child: &mut Entity) -> ModelResult<()> {
        child.set_attribute(&self.foreign_key, parent.get(&self.local_key))?;
        if let Some(morph) = &self.morph {
            child.set_attribute(&morph.column, morph.class.clone())?;
        }
        child.save(db).await
    }
}

#[async_trait]
impl Relation for HasOneOrMany {
    fn name(&self) -> &str {
        &self.name
    }

    fn relationship_type(&self) -> RelationshipType {
        self.relationship_type
    }

    fn constrain(&mut self, constraint: EagerConstraint) {
        self.query = constraint(self.query.clone());
    }

    fn with(&mut self, loads: Vec<EagerLoad>) {
        self.query = self.query.clone().with_loads(loads);
    }

    fn add_constraints(&mut self, parent: &Entity) {
        let foreign_key = self.qualified_foreign_key();
        let query = self
            .query
            .clone()
            .where_eq(&foreign_key, parent.get(&self.local_key))
            .where_not_null(&foreign_key);
        self.query = self.with_morph_constraint(query);
        self.parent = Some(parent.clone());
    }

    fn add_eager_constraints(&mut self, models: &[Entity]) {
        let foreign_key = self.qualified_foreign_key();
        let query = self
            .query
            .clone()
            .where_in(&foreign_key, unique_keys(models, &self.local_key));
        self.query = self.with_morph_constraint(query);
    }

    fn init_relation(&self, models: &mut [Entity], relation: &str) {
        for model in models.iter_mut() {
            model.set_relation(relation, self.empty());
        }
    }

    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str) {
        let dictionary = group_by_key(results, &self.foreign_key);
        for model in models.iter_mut() {
            let Some(matches) = model.key_of(&self.local_key).and_then(|key| dictionary.get(&key)) else {
                continue;
            };
            let value = if self.is_one() {
                RelationValue::One(Box::new(matches[0].clone()))
            } else {
                RelationValue::Many(Collection::new(matches.clone()))
            };
            model.set_relation(relation, value);
        }
    }

    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue> {
        let Some(parent) = &self.parent else {
            return Ok(self.empty());
        };
        if parent.get(&self.local_key).is_null() {
            return Ok(self.empty());
        }

        if self.is_one() {
            Ok(match self.query.first(db).await? {
                Some(model) => RelationValue::One(Box::new(model)),
                None => RelationValue::Null,
            })
        } else {
            Ok(RelationValue::Many(self.query.get(db).await?))
        }
    }

    async fn get_eager(&self, db: &Database) -> ModelResult<Collection> {
        debug!(relation = %self.name, "Eager loading has-one-or-many relation");
        self.query.get(db).await
    }

    fn existence_query(&self, parent: &EntityType) -> ModelResult<ModelQuery> {
        let related = self.query.entity_type().clone();
        let parent_key = parent.qualify_column(&self.local_key);

        let query = if related.table() == parent.table() {
            let hash = relation_count_hash();
            let from = format!("{} as {}", related.table(), hash);
            ModelQuery::new(self.query.registry().clone(), Arc::new(related.aliased(&hash))).tap(|q| q.from(&from))
        } else {
            self.query.clone()
        };

        let foreign_key = query.entity_type().qualify_column(&self.foreign_key);
        let query = query.where_column(&foreign_key, "=", &parent_key);
        Ok(self.with_morph_constraint(query))
    }
}
