//! Entity collections
//!
//! A [`Collection`] is an ordered list of entities whose set operations
//! compare primary keys, never structure or identity. Operations return new
//! collections; only `load`, `make_hidden` and `make_visible` touch the
//! members in place.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Index;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::model::{Entity, ModelQuery, PrimaryKey};

/// Insertion-ordered map; re-inserting a key replaces the value in place
#[derive(Debug, Clone)]
pub struct Dictionary<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Dictionary<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V> Dictionary<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Keep the first value seen for a key
    pub fn insert_if_absent(&mut self, key: K, value: V) {
        if !self.index.contains_key(&key) {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let position = *self.index.get(key)?;
        Some(&mut self.entries[position].1)
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, default: F) -> &mut V {
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn into_values(self) -> Vec<V> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }
}

/// Ordered sequence of entities
#[derive(Debug, Clone, Default)]
pub struct Collection {
    items: Vec<Entity>,
}

impl Collection {
    pub fn new(items: Vec<Entity>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.items.iter_mut()
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Entity> {
        self.items
    }

    pub fn first(&self) -> Option<&Entity> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Entity> {
        self.items.last()
    }

    pub fn push(&mut self, entity: Entity) {
        self.items.push(entity);
    }

    /// First entity with the given key
    pub fn find(&self, key: &PrimaryKey) -> Option<&Entity> {
        self.items.iter().find(|e| e.get_key().as_ref() == Some(key))
    }

    /// Whether an entity with the given key is present
    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.find(key).is_some()
    }

    /// Whether any entity satisfies the predicate
    pub fn contains_where<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Entity) -> bool,
    {
        self.items.iter().any(predicate)
    }

    /// Primary keys of every entity that has one
    pub fn model_keys(&self) -> Vec<PrimaryKey> {
        self.items.iter().filter_map(Entity::get_key).collect()
    }

    /// Values of one attribute across the collection
    pub fn pluck(&self, attribute: &str) -> Vec<Value> {
        self.items.iter().map(|e| e.get(attribute)).collect()
    }

    /// Entities keyed by primary key; later entities overwrite earlier ones
    pub fn get_dictionary(&self) -> Dictionary<Option<PrimaryKey>, Entity> {
        let mut dictionary = Dictionary::new();
        for entity in &self.items {
            dictionary.insert(entity.get_key(), entity.clone());
        }
        dictionary
    }

    /// Merge by key; incoming entities replace existing ones in place
    pub fn merge(&self, items: &Collection) -> Collection {
        let mut dictionary = self.get_dictionary();
        for entity in &items.items {
            dictionary.insert(entity.get_key(), entity.clone());
        }
        Collection::new(dictionary.into_values())
    }

    /// Entities whose key is not present in `items`
    pub fn diff(&self, items: &Collection) -> Collection {
        let other = items.get_dictionary();
        self.filter(|e| !other.contains_key(&e.get_key()))
    }

    /// Entities whose key is present in `items`
    pub fn intersect(&self, items: &Collection) -> Collection {
        let other = items.get_dictionary();
        self.filter(|e| other.contains_key(&e.get_key()))
    }

    /// Deduplicate by primary key, keeping first occurrences in order
    pub fn unique(&self) -> Collection {
        let mut seen = Dictionary::new();
        for entity in &self.items {
            seen.insert_if_absent(entity.get_key(), entity.clone());
        }
        Collection::new(seen.into_values())
    }

    /// Deduplicate by the normalized value of an attribute
    pub fn unique_by(&self, attribute: &str) -> Collection {
        let mut seen = Dictionary::new();
        for entity in &self.items {
            seen.insert_if_absent(entity.key_of(attribute), entity.clone());
        }
        Collection::new(seen.into_values())
    }

    /// Entities with the given keys, in collection order
    pub fn only(&self, keys: &[PrimaryKey]) -> Collection {
        let dictionary = self.get_dictionary();
        Collection::new(
            dictionary
                .into_values()
                .into_iter()
                .filter(|e| e.get_key().is_some_and(|k| keys.contains(&k)))
                .collect(),
        )
    }

    /// Entities without the given keys, in collection order
    pub fn except(&self, keys: &[PrimaryKey]) -> Collection {
        let dictionary = self.get_dictionary();
        Collection::new(
            dictionary
                .into_values()
                .into_iter()
                .filter(|e| !e.get_key().is_some_and(|k| keys.contains(&k)))
                .collect(),
        )
    }

    pub fn filter<F>(&self, predicate: F) -> Collection
    where
        F: Fn(&Entity) -> bool,
    {
        Collection::new(self.items.iter().filter(|e| predicate(e)).cloned().collect())
    }

    /// Eager load relations onto every entity in the collection
    pub async fn load(&mut self, db: &Database, relations: &[&str]) -> ModelResult<()> {
        let Some(first) = self.items.first() else {
            return Ok(());
        };
        let query = ModelQuery::new(db.registry().clone(), first.entity_type().clone()).with(relations);
        query.eager_load_relations(db, &mut self.items).await
    }

    /// Hide attributes on every entity
    pub fn make_hidden(&mut self, attributes: &[&str]) -> &mut Self {
        for entity in &mut self.items {
            entity.make_hidden(attributes);
        }
        self
    }

    /// Unhide attributes on every entity
    pub fn make_visible(&mut self, attributes: &[&str]) -> &mut Self {
        for entity in &mut self.items {
            entity.make_visible(attributes);
        }
        self
    }

    /// The single entity type in the collection, for job serialization
    pub fn queueable_class(&self) -> ModelResult<Option<String>> {
        let Some(first) = self.items.first() else {
            return Ok(None);
        };
        let name = first.type_name();
        if self.items.iter().any(|e| e.type_name() != name) {
            return Err(ModelError::Logic(
                "Queueing collections with multiple model types is not supported.".to_string(),
            ));
        }
        Ok(Some(name.to_string()))
    }

    pub fn queueable_ids(&self) -> Vec<PrimaryKey> {
        self.model_keys()
    }
}

impl Index<usize> for Collection {
    type Output = Entity;

    fn index(&self, index: usize) -> &Entity {
        &self.items[index]
    }
}

impl FromIterator<Entity> for Collection {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Collection::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl From<Vec<Entity>> for Collection {
    fn from(items: Vec<Entity>) -> Self {
        Collection::new(items)
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for entity in &self.items {
            seq.serialize_element(entity)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::Row;
    use crate::model::EntityType;
    use serde_json::json;
    use std::sync::Arc;

    fn post(id: i64, title: &str) -> Entity {
        let entity_type = Arc::new(EntityType::new("Post", "posts"));
        let mut row = Row::new();
        row.insert("id".into(), json!(id));
        row.insert("title".into(), json!(title));
        Entity::from_row(entity_type, row)
    }

    fn titles(collection: &Collection) -> Vec<String> {
        collection
            .iter()
            .map(|e| e.get("title").as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_unique_keeps_first_occurrence() {
        let items = Collection::new(vec![post(1, "A"), post(1, "B"), post(2, "C")]);
        assert_eq!(titles(&items.unique()), vec!["A", "C"]);
    }

    #[test]
    fn test_merge_overwrites_in_place() {
        let items = Collection::new(vec![post(1, "A"), post(2, "B")]);
        let merged = items.merge(&Collection::new(vec![post(1, "X")]));
        assert_eq!(titles(&merged), vec!["X", "B"]);

        let merged = items.merge(&Collection::new(vec![post(3, "Z")]));
        assert_eq!(titles(&merged), vec!["A", "B", "Z"]);
    }

    #[test]
    fn test_diff_and_intersect_by_key() {
        let items = Collection::new(vec![post(1, "A"), post(2, "B"), post(3, "C")]);
        let other = Collection::new(vec![post(2, "other title"), post(9, "Q")]);
        assert_eq!(titles(&items.diff(&other)), vec!["A", "C"]);
        assert_eq!(titles(&items.intersect(&other)), vec!["B"]);
    }

    #[test]
    fn test_only_and_except() {
        let items = Collection::new(vec![post(1, "A"), post(2, "B"), post(3, "C")]);
        let keys = [PrimaryKey::Integer(3), PrimaryKey::Integer(1)];
        assert_eq!(titles(&items.only(&keys)), vec!["A", "C"]);
        assert_eq!(titles(&items.except(&keys)), vec!["B"]);
    }

    #[test]
    fn test_find_and_contains() {
        let items = Collection::new(vec![post(1, "A"), post(2, "B")]);
        assert_eq!(
            items.find(&PrimaryKey::Integer(2)).map(|e| e.get("title")),
            Some(json!("B"))
        );
        assert!(items.contains(&PrimaryKey::from("1")));
        assert!(!items.contains(&PrimaryKey::Integer(5)));
        assert!(items.contains_where(|e| e.get("title") == json!("A")));
    }

    #[test]
    fn test_queueable_class_rejects_mixed_types() {
        let user_type = Arc::new(EntityType::new("User", "users"));
        let mixed = Collection::new(vec![post(1, "A"), Entity::new(user_type)]);
        assert!(matches!(mixed.queueable_class(), Err(ModelError::Logic(_))));

        let same = Collection::new(vec![post(1, "A"), post(2, "B")]);
        assert_eq!(same.queueable_class().unwrap(), Some("Post".to_string()));
        assert_eq!(same.queueable_ids(), vec![PrimaryKey::Integer(1), PrimaryKey::Integer(2)]);
    }

    #[test]
    fn test_make_hidden_mutates_members() {
        let mut items = Collection::new(vec![post(1, "A")]);
        items.make_hidden(&["title"]);
        assert_eq!(serde_json::to_value(&items).unwrap(), json!([{"id": 1}]));
        items.make_visible(&["title"]);
        assert_eq!(serde_json::to_value(&items).unwrap(), json!([{"id": 1, "title": "A"}]));
    }
}
