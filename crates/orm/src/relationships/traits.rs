//! Relationship Traits - Core traits for relationship management

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::metadata::RelationshipType;
use crate::collection::Collection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{Entity, EntityType, ModelQuery, PrimaryKey, RelationValue};

/// Caller-supplied constraint applied to a related query
pub type EagerConstraint = Arc<dyn Fn(ModelQuery) -> ModelQuery + Send + Sync>;

/// A requested eager load, possibly nested (`posts.comments`)
#[derive(Clone)]
pub struct EagerLoad {
    pub name: String,
    pub constraint: Option<EagerConstraint>,
}

impl EagerLoad {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: None,
        }
    }

    pub fn constrained<F>(name: &str, constraint: F) -> Self
    where
        F: Fn(ModelQuery) -> ModelQuery + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            constraint: Some(Arc::new(constraint)),
        }
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("name", &self.name)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

/// Extra `type column = class` predicate of polymorphic relations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphConstraint {
    /// Unqualified morph type column
    pub column: String,
    pub class: String,
}

/// Core relationship trait
///
/// A relation instance owns a query against the related entity type. It is
/// either bound to one parent (lazy loading) or constrained to a batch of
/// parents and matched back onto them (eager loading).
#[async_trait]
pub trait Relation: Send + Sync {
    fn name(&self) -> &str;

    fn relationship_type(&self) -> RelationshipType;

    /// Apply a caller constraint to the related query
    fn constrain(&mut self, constraint: EagerConstraint);

    /// Nested eager loads to run on the related entities
    fn with(&mut self, loads: Vec<EagerLoad>);

    /// Constrain the related query to a single parent
    fn add_constraints(&mut self, parent: &Entity);

    /// Constrain the related query to a batch of parents
    fn add_eager_constraints(&mut self, models: &[Entity]);

    /// Give every parent an empty relation slot
    fn init_relation(&self, models: &mut [Entity], relation: &str);

    /// Distribute eagerly fetched results onto their parents
    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str);

    /// Lazy result for the parent given to [`Relation::add_constraints`]
    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue>;

    /// Run the eager query
    async fn get_eager(&self, db: &Database) -> ModelResult<Collection>;

    /// Eager load this relation onto `models`
    async fn eager_load(&mut self, db: &Database, models: &mut [Entity], relation: &str) -> ModelResult<()> {
        self.add_eager_constraints(models);
        self.init_relation(models, relation);
        let results = self.get_eager(db).await?;
        self.match_results(models, results, relation);
        Ok(())
    }

    /// Related query correlated with the parent table, for `exists` subqueries
    fn existence_query(&self, parent: &EntityType) -> ModelResult<ModelQuery>;
}

static RELATION_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Unique alias for self-referencing existence queries
pub fn relation_count_hash() -> String {
    format!("reserved_{}", RELATION_COUNT.fetch_add(1, Ordering::Relaxed))
}

/// Distinct non-null values of `attribute` across `models`, in first-seen order
pub(crate) fn unique_keys(models: &[Entity], attribute: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    models
        .iter()
        .filter_map(|model| {
            let key = model.key_of(attribute)?;
            seen.insert(key.clone()).then(|| key.to_value())
        })
        .collect()
}

/// Group results by the normalized value of `attribute`
pub(crate) fn group_by_key(results: Collection, attribute: &str) -> HashMap<PrimaryKey, Vec<Entity>> {
    let mut dictionary: HashMap<PrimaryKey, Vec<Entity>> = HashMap::new();
    for result in results {
        if let Some(key) = result.key_of(attribute) {
            dictionary.entry(key).or_default().push(result);
        }
    }
    dictionary
}
