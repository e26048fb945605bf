//! Relationship Registry - runtime storage of entity types, relations and the morph map

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::metadata::RelationshipMetadata;
use crate::error::{ModelError, ModelResult};
use crate::model::EntityType;

/// Thread-safe registry of entity types and their relations
///
/// Cloning is cheap; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    /// Entity type name -> descriptor
    entity_types: Arc<DashMap<String, Arc<EntityType>>>,

    /// Entity type name -> relationship name -> metadata
    relationships: Arc<DashMap<String, HashMap<String, Arc<RelationshipMetadata>>>>,

    /// Morph discriminator -> entity type name
    morph_map: Arc<DashMap<String, String>>,
}

impl RelationshipRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, replacing any previous one with the same name
    pub fn register_entity(&self, entity_type: EntityType) -> Arc<EntityType> {
        let entity_type = Arc::new(entity_type);
        debug!(
            entity = entity_type.name(),
            table = entity_type.table(),
            "Registered entity type"
        );
        self.entity_types
            .insert(entity_type.name().to_string(), entity_type.clone());
        entity_type
    }

    /// Register a relationship for an entity type
    pub fn register(&self, model_name: &str, metadata: RelationshipMetadata) -> ModelResult<()> {
        metadata.validate()?;

        debug!(
            model = model_name,
            relationship = %metadata.name,
            kind = ?metadata.relationship_type(),
            "Registered relationship"
        );

        self.relationships
            .entry(model_name.to_string())
            .or_default()
            .insert(metadata.name.clone(), Arc::new(metadata));

        Ok(())
    }

    /// Map a discriminator stored in morph type columns to an entity type
    pub fn morph_map(&self, discriminator: &str, model_name: &str) {
        self.morph_map
            .insert(discriminator.to_string(), model_name.to_string());
    }

    pub fn entity_type(&self, model_name: &str) -> ModelResult<Arc<EntityType>> {
        self.entity_types
            .get(model_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ModelError::UnknownEntityType(model_name.to_string()))
    }

    /// Get relationship metadata by model and relationship name
    pub fn get(&self, model_name: &str, relationship_name: &str) -> ModelResult<Arc<RelationshipMetadata>> {
        self.relationships
            .get(model_name)
            .and_then(|relationships| relationships.get(relationship_name).cloned())
            .ok_or_else(|| ModelError::UnknownRelation {
                model: model_name.to_string(),
                relation: relationship_name.to_string(),
            })
    }

    pub fn has_relationship(&self, model_name: &str, relationship_name: &str) -> bool {
        self.relationships
            .get(model_name)
            .map(|relationships| relationships.contains_key(relationship_name))
            .unwrap_or(false)
    }

    /// Get all relationship names for a model
    pub fn get_relationship_names(&self, model_name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .relationships
            .get(model_name)
            .map(|relationships| relationships.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Resolve a morph type column value to an entity type
    ///
    /// The morph map is consulted first, then registered morph classes.
    pub fn resolve_morph(&self, discriminator: &str) -> ModelResult<Arc<EntityType>> {
        if let Some(model_name) = self.morph_map.get(discriminator) {
            return self.entity_type(model_name.value());
        }

        self.entity_types
            .iter()
            .find(|entry| entry.value().morph_class() == discriminator)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ModelError::UnknownMorphType(discriminator.to_string()))
    }

    /// Discriminator written into morph type columns for an entity type
    pub fn morph_class_for(&self, entity_type: &EntityType) -> String {
        self.morph_map
            .iter()
            .find(|entry| entry.value() == entity_type.name())
            .map(|entry| entry.key().clone())
            .unwrap_or_else(|| entity_type.morph_class().to_string())
    }

    /// Check that every relation and morph map entry names a registered type
    pub fn validate(&self) -> ModelResult<()> {
        for entry in self.relationships.iter() {
            self.entity_type(entry.key())?;
            for metadata in entry.value().values() {
                for referenced in metadata.referenced_types() {
                    self.entity_type(referenced).map_err(|_| {
                        ModelError::Relationship(format!(
                            "Relationship '{}.{}' references unregistered model '{}'",
                            entry.key(),
                            metadata.name,
                            referenced
                        ))
                    })?;
                }
            }
        }

        for entry in self.morph_map.iter() {
            self.entity_type(entry.value())?;
        }

        Ok(())
    }
}
