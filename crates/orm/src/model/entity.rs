//! Entity - a dynamically typed record bound to an [`EntityType`]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::entity_type::EntityType;
use super::primary_key::PrimaryKey;
use crate::backends::Row;
use crate::collection::Collection;
use crate::error::{ModelError, ModelResult};

/// A loaded relation slot
#[derive(Debug, Clone)]
pub enum RelationValue {
    /// Loaded, nothing matched
    Null,
    One(Box<Entity>),
    Many(Collection),
}

impl RelationValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RelationValue::Null)
    }

    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            RelationValue::One(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&Collection> {
        match self {
            RelationValue::Many(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_one_mut(&mut self) -> Option<&mut Entity> {
        match self {
            RelationValue::One(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_many_mut(&mut self) -> Option<&mut Collection> {
        match self {
            RelationValue::Many(collection) => Some(collection),
            _ => None,
        }
    }
}

impl Serialize for RelationValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationValue::Null => serializer.serialize_none(),
            RelationValue::One(entity) => entity.serialize(serializer),
            RelationValue::Many(collection) => collection.serialize(serializer),
        }
    }
}

/// One persisted or persistable record
#[derive(Debug, Clone)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    attributes: Row,
    original: Row,
    exists: bool,
    relations: BTreeMap<String, RelationValue>,
    hidden: Vec<String>,
    visible: Vec<String>,
}

impl Entity {
    /// New, unsaved entity
    pub fn new(entity_type: Arc<EntityType>) -> Self {
        let hidden = entity_type.hidden().to_vec();
        let visible = entity_type.visible().to_vec();
        Self {
            entity_type,
            attributes: Row::new(),
            original: Row::new(),
            exists: false,
            relations: BTreeMap::new(),
            hidden,
            visible,
        }
    }

    /// New, unsaved entity with initial attributes
    pub fn with_attributes(entity_type: Arc<EntityType>, attributes: Row) -> Self {
        let mut entity = Self::new(entity_type);
        entity.attributes = attributes;
        entity
    }

    /// Hydrate a persisted entity from a fetched row
    pub fn from_row(entity_type: Arc<EntityType>, row: Row) -> Self {
        let mut entity = Self::new(entity_type);
        entity.original = row.clone();
        entity.attributes = row;
        entity.exists = true;
        entity
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    pub fn type_name(&self) -> &str {
        self.entity_type.name()
    }

    pub fn table(&self) -> &str {
        self.entity_type.table()
    }

    /// Whether the entity is backed by a stored row
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    pub fn key_name(&self) -> &str {
        self.entity_type.key_name()
    }

    /// Normalized primary key, if set
    pub fn get_key(&self) -> Option<PrimaryKey> {
        self.key_of(self.entity_type.key_name())
    }

    /// Normalized value of any attribute, for matching on join columns
    pub fn key_of(&self, attribute: &str) -> Option<PrimaryKey> {
        self.attributes.get(attribute).and_then(PrimaryKey::from_value)
    }

    /// Raw primary key value, null when unset
    pub fn get_key_value(&self) -> Value {
        self.get(self.entity_type.key_name())
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute value, null when missing
    pub fn get(&self, key: &str) -> Value {
        self.attributes.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.get(key)
    }

    /// Set an attribute
    ///
    /// Changing the primary key of a persisted entity is rejected.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        if self.exists && key == self.entity_type.key_name() {
            let current = self.original.get(key).and_then(PrimaryKey::from_value);
            if current.is_some() && current != PrimaryKey::from_value(&value) {
                return Err(ModelError::ImmutablePrimaryKey {
                    model: self.type_name().to_string(),
                });
            }
        }
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Set several attributes
    pub fn fill(&mut self, attributes: Row) -> ModelResult<()> {
        for (key, value) in attributes {
            self.set_attribute(&key, value)?;
        }
        Ok(())
    }

    pub(crate) fn force_set(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    pub(crate) fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Attributes changed since the entity was loaded or last saved
    pub fn get_dirty(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(key, value)| self.original.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.get_dirty().is_empty()
    }

    /// Accept the current attributes as the stored state
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    pub(crate) fn sync_original_attribute(&mut self, key: &str) {
        match self.attributes.get(key) {
            Some(value) => {
                self.original.insert(key.to_string(), value.clone());
            }
            None => {
                self.original.remove(key);
            }
        }
    }

    /// Whether the entity has been soft deleted
    pub fn trashed(&self) -> bool {
        self.entity_type.soft_deletes()
            && !self.get(self.entity_type.deleted_at_column()).is_null()
    }

    pub fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.relations.insert(name.to_string(), value);
    }

    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut RelationValue> {
        self.relations.get_mut(name)
    }

    /// Whether a relation slot has been populated, even with nothing
    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn unset_relation(&mut self, name: &str) -> Option<RelationValue> {
        self.relations.remove(name)
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationValue> {
        &self.relations
    }

    /// Hide attributes from serialization
    pub fn make_hidden(&mut self, attributes: &[&str]) {
        for attribute in attributes {
            if !self.hidden.iter().any(|h| h == attribute) {
                self.hidden.push(attribute.to_string());
            }
        }
    }

    /// Unhide attributes for serialization
    pub fn make_visible(&mut self, attributes: &[&str]) {
        self.hidden.retain(|h| !attributes.contains(&h.as_str()));
        if !self.visible.is_empty() {
            for attribute in attributes {
                if !self.visible.iter().any(|v| v == attribute) {
                    self.visible.push(attribute.to_string());
                }
            }
        }
    }

    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    fn is_serialized(&self, key: &str) -> bool {
        if self.hidden.iter().any(|h| h == key) {
            return false;
        }
        self.visible.is_empty() || self.visible.iter().any(|v| v == key)
    }

    /// JSON view of visible attributes and loaded relations
    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize the attributes into a typed model
    pub fn hydrate<M: DeserializeOwned>(&self) -> ModelResult<M> {
        Ok(serde_json::from_value(Value::Object(self.attributes.clone()))?)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.attributes {
            if self.is_serialized(key) {
                map.serialize_entry(key, value)?;
            }
        }
        for (name, relation) in &self.relations {
            if self.is_serialized(name) {
                map.serialize_entry(name, relation)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn user_type() -> Arc<EntityType> {
        Arc::new(EntityType::new("User", "users").with_hidden(&["password"]))
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_new_entities_have_no_key() {
        let user = Entity::new(user_type());
        assert!(!user.exists());
        assert_eq!(user.get_key(), None);
    }

    #[test]
    fn test_persisted_key_is_immutable() {
        let mut user = Entity::from_row(user_type(), row(json!({"id": 3, "name": "Ann"})));
        assert!(user.set_attribute("id", "3").is_ok());
        assert!(matches!(
            user.set_attribute("id", 4),
            Err(ModelError::ImmutablePrimaryKey { .. })
        ));
        assert!(user.set_attribute("name", "Bea").is_ok());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut user = Entity::from_row(user_type(), row(json!({"id": 1, "name": "Ann"})));
        assert!(!user.is_dirty());
        user.set_attribute("name", "Bea").unwrap();
        assert_eq!(user.get_dirty(), row(json!({"name": "Bea"})));
        user.sync_original();
        assert!(!user.is_dirty());
    }

    #[test]
    fn test_serialization_respects_hidden_and_relations() {
        let mut user = Entity::from_row(user_type(), row(json!({"id": 1, "password": "x"})));
        user.set_relation("profile", RelationValue::Null);
        assert_eq!(user.to_json().unwrap(), json!({"id": 1, "profile": null}));

        user.make_visible(&["password"]);
        assert_eq!(user.to_json().unwrap()["password"], json!("x"));
    }

    #[test]
    fn test_hydrate_into_typed_model() {
        #[derive(Deserialize)]
        struct User {
            id: i64,
            name: String,
        }

        let entity = Entity::from_row(user_type(), row(json!({"id": 9, "name": "Cy"})));
        let user: User = entity.hydrate().unwrap();
        assert_eq!((user.id, user.name.as_str()), (9, "Cy"));
    }
}
