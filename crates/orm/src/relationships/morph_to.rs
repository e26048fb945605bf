//! MorphTo - inverse polymorphic relation
//!
//! Each owner row names its related type in a morph type column. Eager
//! loading groups owners by that type and runs one query per type. Builder
//! calls made on the relation are recorded and replayed onto every per-type
//! query; soft-delete extensions only reach types that support them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::metadata::RelationshipType;
use super::registry::RelationshipRegistry;
use super::traits::{EagerConstraint, EagerLoad, Relation};
use crate::collection::{Collection, Dictionary};
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, EntityType, ModelQuery, PrimaryKey, RelationValue, ScopeExtension};

/// A builder call recorded for replay onto per-type queries
#[derive(Clone)]
pub enum PendingOp {
    Constrain(EagerConstraint),
    With(Vec<EagerLoad>),
    Extension(ScopeExtension),
}

impl std::fmt::Debug for PendingOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingOp::Constrain(_) => f.write_str("Constrain(..)"),
            PendingOp::With(loads) => f.debug_tuple("With").field(loads).finish(),
            PendingOp::Extension(extension) => f.debug_tuple("Extension").field(extension).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MorphTo {
    name: String,
    registry: RelationshipRegistry,
    morph_type: String,
    foreign_key: String,
    owner_key: Option<String>,
    pending: Vec<PendingOp>,
    parent: Option<Entity>,
    /// morph type -> foreign key -> indices of owners
    dictionary: Dictionary<String, HashMap<PrimaryKey, Vec<usize>>>,
}

impl MorphTo {
    pub fn new(name: &str, registry: RelationshipRegistry, morph_type: &str, foreign_key: &str, owner_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            registry,
            morph_type: morph_type.to_string(),
            foreign_key: foreign_key.to_string(),
            owner_key: owner_key.map(str::to_string),
            pending: Vec::new(),
            parent: None,
            dictionary: Dictionary::new(),
        }
    }

    /// Record a non-terminal scope extension for replay
    pub fn extend(&mut self, extension: ScopeExtension) -> ModelResult<()> {
        if extension.is_terminal() {
            return Err(ModelError::Logic(format!(
                "Cannot apply {} to a morph-to relation",
                extension
            )));
        }
        self.pending.push(PendingOp::Extension(extension));
        Ok(())
    }

    pub fn with_trashed(mut self) -> Self {
        self.pending.push(PendingOp::Extension(ScopeExtension::WithTrashed));
        self
    }

    pub fn without_trashed(mut self) -> Self {
        self.pending.push(PendingOp::Extension(ScopeExtension::WithoutTrashed));
        self
    }

    pub fn only_trashed(mut self) -> Self {
        self.pending.push(PendingOp::Extension(ScopeExtension::OnlyTrashed));
        self
    }

    pub fn pending(&self) -> &[PendingOp] {
        &self.pending
    }

    fn key_name_for<'a>(&'a self, entity_type: &'a EntityType) -> &'a str {
        self.owner_key.as_deref().unwrap_or_else(|| entity_type.key_name())
    }

    /// Point `child` at `related`, recording its morph class, and cache the relation
    pub fn associate(&self, child: &mut Entity, related: &Entity) -> ModelResult<()> {
        let key = related.get(self.key_name_for(related.entity_type()));
        child.set_attribute(&self.foreign_key, key)?;
        child.set_attribute(&self.morph_type, self.registry.morph_class_for(related.entity_type()))?;
        child.set_relation(&self.name, RelationValue::One(Box::new(related.clone())));
        Ok(())
    }

    /// Clear both the morph type and foreign key on `child`
    pub fn dissociate(&self, child: &mut Entity) -> ModelResult<()> {
        child.set_attribute(&self.foreign_key, Value::Null)?;
        child.set_attribute(&self.morph_type, Value::Null)?;
        child.set_relation(&self.name, RelationValue::Null);
        Ok(())
    }

    /// Query for one related type with recorded calls replayed
    pub fn query_for(&self, entity_type: Arc<EntityType>) -> ModelResult<ModelQuery> {
        let mut query = ModelQuery::new(self.registry.clone(), entity_type);
        for op in &self.pending {
            query = match op {
                PendingOp::Constrain(constraint) => constraint(query),
                PendingOp::With(loads) => query.with_loads(loads.clone()),
                PendingOp::Extension(extension) => {
                    if query.entity_type().supports_extension(*extension) {
                        query.extend(*extension)?
                    } else {
                        query
                    }
                }
            };
        }
        Ok(query)
    }

    fn build_dictionary(&mut self, models: &[Entity]) {
        self.dictionary = Dictionary::new();
        for (index, model) in models.iter().enumerate() {
            let Some(morph_type) = model
                .get_attribute(&self.morph_type)
                .and_then(|v| v.as_str())
                .filter(|t| !t.is_empty())
            else {
                continue;
            };
            let Some(key) = model.key_of(&self.foreign_key) else {
                continue;
            };
            self.dictionary
                .get_or_insert_with(morph_type.to_string(), HashMap::new)
                .entry(key)
                .or_default()
                .push(index);
        }
    }
}

#[async_trait]
impl Relation for MorphTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn relationship_type(&self) -> RelationshipType {
        RelationshipType::MorphTo
    }

    fn constrain(&mut self, constraint: EagerConstraint) {
        self.pending.push(PendingOp::Constrain(constraint));
    }

    fn with(&mut self, loads: Vec<EagerLoad>) {
        self.pending.push(PendingOp::With(loads));
    }

    fn add_constraints(&mut self, parent: &Entity) {
        self.parent = Some(parent.clone());
    }

    fn add_eager_constraints(&mut self, models: &[Entity]) {
        self.build_dictionary(models);
    }

    fn init_relation(&self, models: &mut [Entity], relation: &str) {
        for model in models.iter_mut() {
            model.set_relation(relation, RelationValue::Null);
        }
    }

    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str) {
        let resolved: Vec<(Arc<EntityType>, &HashMap<PrimaryKey, Vec<usize>>)> = self
            .dictionary
            .iter()
            .filter_map(|(morph_type, by_key)| Some((self.registry.resolve_morph(morph_type).ok()?, by_key)))
            .collect();

        for result in results {
            for (entity_type, by_key) in &resolved {
                if entity_type.name() != result.type_name() {
                    continue;
                }
                let Some(indices) = result.key_of(self.key_name_for(entity_type)).and_then(|key| by_key.get(&key)) else {
                    continue;
                };
                for &index in indices {
                    if let Some(model) = models.get_mut(index) {
                        model.set_relation(relation, RelationValue::One(Box::new(result.clone())));
                    }
                }
            }
        }
    }

    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue> {
        let Some(parent) = &self.parent else {
            return Ok(RelationValue::Null);
        };
        let morph_type = match parent.get_attribute(&self.morph_type).and_then(|v| v.as_str()) {
            Some(morph_type) if !morph_type.is_empty() => morph_type,
            _ => return Ok(RelationValue::Null),
        };
        let key = parent.get(&self.foreign_key);
        if key.is_null() {
            return Ok(RelationValue::Null);
        }

        let entity_type = self.registry.resolve_morph(morph_type)?;
        let column = entity_type.qualify_column(self.key_name_for(&entity_type));
        let query = self.query_for(entity_type.clone())?.where_eq(&column, key);
        Ok(match query.first(db).await? {
            Some(model) => RelationValue::One(Box::new(model)),
            None => RelationValue::Null,
        })
    }

    async fn get_eager(&self, db: &Database) -> ModelResult<Collection> {
        let mut results = Vec::new();
        for (morph_type, by_key) in self.dictionary.iter() {
            let entity_type = self.registry.resolve_morph(morph_type)?;
            let column = entity_type.qualify_column(self.key_name_for(&entity_type));
            let keys: Vec<_> = by_key.keys().map(PrimaryKey::to_value).collect();

            debug!(
                relation = %self.name,
                morph_type = %morph_type,
                keys = keys.len(),
                "Eager loading morph-to type"
            );

            let query = self.query_for(entity_type.clone())?.where_in(&column, keys);
            results.extend(query.get(db).await?.into_vec());
        }
        Ok(Collection::new(results))
    }

    fn existence_query(&self, _parent: &EntityType) -> ModelResult<ModelQuery> {
        Err(ModelError::Logic(format!(
            "Existence queries are not supported for morph-to relation '{}'",
            self.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Row;
    use serde_json::{json, Value};

    fn registry() -> RelationshipRegistry {
        let registry = RelationshipRegistry::new();
        registry.register_entity(EntityType::new("Post", "posts").with_soft_deletes());
        registry.register_entity(EntityType::new("Video", "videos"));
        registry
    }

    fn comment(morph_type: Value, id: Value) -> Entity {
        let mut row = Row::new();
        row.insert("commentable_type".to_string(), morph_type);
        row.insert("commentable_id".to_string(), id);
        Entity::from_row(Arc::new(EntityType::new("Comment", "comments")), row)
    }

    fn relation() -> MorphTo {
        MorphTo::new("commentable", registry(), "commentable_type", "commentable_id", None)
    }

    #[test]
    fn test_dictionary_groups_by_type_then_key() {
        let mut relation = relation();
        relation.add_eager_constraints(&[
            comment(json!("Post"), json!(1)),
            comment(json!("Video"), json!(1)),
            comment(json!("Post"), json!("1")),
            comment(Value::Null, json!(3)),
        ]);
        let types: Vec<&String> = relation.dictionary.keys().collect();
        assert_eq!(types, vec!["Post", "Video"]);
        let posts = relation.dictionary.get(&"Post".to_string()).unwrap();
        assert_eq!(posts.get(&PrimaryKey::Integer(1)), Some(&vec![0, 2]));
    }

    #[test]
    fn test_extensions_only_replay_onto_supporting_types() {
        let relation = relation().with_trashed();
        let posts = relation.query_for(relation.registry.entity_type("Post").unwrap()).unwrap();
        assert!(posts.to_base().wheres().is_empty());

        let videos = relation.query_for(relation.registry.entity_type("Video").unwrap()).unwrap();
        assert!(videos.to_base().wheres().is_empty());

        let plain = MorphTo::new("commentable", registry(), "commentable_type", "commentable_id", None);
        let posts = plain.query_for(plain.registry.entity_type("Post").unwrap()).unwrap();
        assert_eq!(posts.to_base().wheres().len(), 1);
    }

    #[test]
    fn test_associate_and_dissociate() {
        let registry = registry();
        registry.morph_map("posts", "Post");
        let relation = MorphTo::new("commentable", registry.clone(), "commentable_type", "commentable_id", None);
        let mut child = Entity::new(Arc::new(EntityType::new("Comment", "comments")));
        let mut row = Row::new();
        row.insert("id".to_string(), json!(9));
        let post = Entity::from_row(registry.entity_type("Post").unwrap(), row);

        relation.associate(&mut child, &post).unwrap();
        assert_eq!(child.get("commentable_id"), json!(9));
        assert_eq!(child.get("commentable_type"), json!("posts"));
        assert_eq!(
            child.relation("commentable").and_then(|r| r.as_one()).map(|m| m.get("id")),
            Some(json!(9))
        );

        relation.dissociate(&mut child).unwrap();
        assert_eq!(child.get("commentable_id"), Value::Null);
        assert_eq!(child.get("commentable_type"), Value::Null);
        assert!(child.relation("commentable").map(|r| r.is_null()).unwrap_or(false));
    }

    #[test]
    fn test_terminal_extensions_are_rejected() {
        let mut relation = relation();
        assert!(relation.extend(ScopeExtension::ForceDelete).is_err());
        assert!(relation.extend(ScopeExtension::OnlyTrashed).is_ok());
    }

    #[test]
    fn test_match_results_by_type_and_key() {
        let mut relation = relation();
        let mut models = vec![comment(json!("Post"), json!(1)), comment(json!("Video"), json!(1))];
        relation.add_eager_constraints(&models);
        relation.init_relation(&mut models, "commentable");

        let mut row = Row::new();
        row.insert("id".to_string(), json!(1));
        let video = Entity::from_row(relation.registry.entity_type("Video").unwrap(), row);
        relation.match_results(&mut models, Collection::new(vec![video]), "commentable");

        assert!(models[0].relation("commentable").map(|r| r.is_null()).unwrap_or(false));
        assert_eq!(
            models[1].relation("commentable").and_then(|r| r.as_one()).map(|m| m.type_name().to_string()),
            Some("Video".to_string())
        );
    }

    #[test]
    fn test_existence_queries_are_unsupported() {
        assert!(matches!(
            relation().existence_query(&EntityType::new("Comment", "comments")),
            Err(ModelError::Logic(_))
        ));
    }
}
