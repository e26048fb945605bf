//! Many-to-many relations through a pivot table
//!
//! The related query joins the pivot table. When it runs, the pivot keys are
//! appended to whatever columns it selects, aliased as `pivot_<column>`.
//! After fetching, those columns are moved into a `pivot` relation on each
//! result. Morph-to-many adds `pivot.{name}_type = class`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::metadata::RelationshipType;
use super::pivot::Pivot;
use super::traits::{relation_count_hash, unique_keys, EagerConstraint, EagerLoad, MorphConstraint, Relation};
use crate::backends::Row;
use crate::collection::Collection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::grammar::Record;
use crate::model::{Entity, EntityType, ModelQuery, PrimaryKey, RelationValue};
use crate::query::{Query, QueryValue};

const PIVOT_PREFIX: &str = "pivot_";

#[derive(Debug, Clone)]
pub struct BelongsToMany {
    name: String,
    query: ModelQuery,
    table: String,
    foreign_pivot_key: String,
    related_pivot_key: String,
    parent_key: String,
    pivot_columns: Vec<String>,
    morph: Option<MorphConstraint>,
    parent: Option<Entity>,
}

impl BelongsToMany {
    pub fn new(
        name: &str,
        query: ModelQuery,
        table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
        parent_key: &str,
    ) -> Self {
        let relation = Self {
            name: name.to_string(),
            query,
            table: table.to_string(),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            parent_key: parent_key.to_string(),
            pivot_columns: Vec::new(),
            morph: None,
            parent: None,
        };
        relation.set_join()
    }

    /// Morph-to-many: pivot rows are also keyed by `morph_type = class`
    pub fn morph(mut self, morph_type: &str, class: &str) -> Self {
        self.morph = Some(MorphConstraint {
            column: morph_type.to_string(),
            class: class.to_string(),
        });
        self
    }

    /// Extra pivot columns to select
    pub fn with_pivot(mut self, columns: &[String]) -> Self {
        self.pivot_columns.extend(columns.iter().cloned());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn query(&self) -> &ModelQuery {
        &self.query
    }

    fn set_join(mut self) -> Self {
        let related = self.query.entity_type().clone();
        let pivot_related = format!("{}.{}", self.table, self.related_pivot_key);
        self.query = self
            .query
            .clone()
            .tap(|q| q.join(&self.table, &related.qualified_key_name(), "=", &pivot_related));
        self
    }

    /// The related query with aliased pivot columns added to its selection
    ///
    /// An unselected query gets `related.*` first.
    fn select_query(&self) -> ModelQuery {
        let mut columns = Vec::new();
        if self.query.query().columns().is_none() {
            columns.push(format!("{}.*", self.query.entity_type().table()));
        }
        let pivot = [&self.foreign_pivot_key, &self.related_pivot_key]
            .into_iter()
            .chain(self.pivot_columns.iter());
        columns.extend(pivot.map(|column| format!("{}.{} as {}{}", self.table, column, PIVOT_PREFIX, column)));
        self.query.clone().tap(|q| q.add_select(columns))
    }

    fn qualified_foreign_pivot_key(&self) -> String {
        format!("{}.{}", self.table, self.foreign_pivot_key)
    }

    fn with_morph_constraint(&self, query: ModelQuery) -> ModelQuery {
        match &self.morph {
            Some(morph) => {
                let column = format!("{}.{}", self.table, morph.column);
                query.where_eq(&column, morph.class.clone())
            }
            None => query,
        }
    }

    /// Move `pivot_*` columns of each result into a `pivot` relation
    fn hydrate_pivot_relations(&self, results: &mut Collection) {
        for model in results.iter_mut() {
            let columns: Vec<String> = model
                .attributes()
                .keys()
                .filter(|key| key.starts_with(PIVOT_PREFIX))
                .cloned()
                .collect();

            let mut attributes = Row::new();
            for column in columns {
                if let Some(value) = model.remove_attribute(&column) {
                    attributes.insert(column[PIVOT_PREFIX.len()..].to_string(), value);
                }
            }
            model.sync_original();

            let pivot = self.new_pivot(attributes, true);
            model.set_relation("pivot", RelationValue::One(Box::new(pivot.into_entity())));
        }
    }

    /// Pivot row for this relation's table and keys
    pub fn new_pivot(&self, attributes: Row, exists: bool) -> Pivot {
        let pivot = Pivot::new(&self.table, attributes, exists, &self.foreign_pivot_key, &self.related_pivot_key);
        match &self.morph {
            Some(morph) => pivot.with_morph(&morph.column, &morph.class),
            None => pivot,
        }
    }

    fn pivot_query(&self, parent: &Entity) -> Query {
        let query = Query::table(&self.table).where_eq(&self.foreign_pivot_key, parent.get(&self.parent_key));
        match &self.morph {
            Some(morph) => query.where_eq(&morph.column, morph.class.as_str()),
            None => query,
        }
    }

    /// Insert pivot rows linking `parent` to each of `ids`
    pub async fn attach(&self, db: &Database, parent: &Entity, ids: &[Value], extra: &Row) -> ModelResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let records: Vec<Record> = ids
            .iter()
            .map(|id| {
                let mut record = Record::new();
                record.insert(self.foreign_pivot_key.clone(), QueryValue::from(parent.get(&self.parent_key)));
                record.insert(self.related_pivot_key.clone(), QueryValue::from(id.clone()));
                if let Some(morph) = &self.morph {
                    record.insert(morph.column.clone(), QueryValue::from(morph.class.as_str()));
                }
                for (column, value) in extra {
                    record.insert(column.clone(), QueryValue::from(value.clone()));
                }
                record
            })
            .collect();

        debug!(relation = %self.name, count = records.len(), "Attaching pivot rows");
        db.insert(&Query::table(&self.table), &records).await?;
        Ok(())
    }

    /// Delete pivot rows for `parent`, limited to `ids` when given
    pub async fn detach(&self, db: &Database, parent: &Entity, ids: Option<&[Value]>) -> ModelResult<u64> {
        let mut query = self.pivot_query(parent);
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(0);
            }
            query = query.where_in(&self.related_pivot_key, ids.iter().cloned());
        }
        debug!(relation = %self.name, "Detaching pivot rows");
        db.delete(&query).await
    }
}

#[async_trait]
impl Relation for BelongsToMany {
    fn name(&self) -> &str {
        &self.name
    }

    fn relationship_type(&self) -> RelationshipType {
        if self.morph.is_some() {
            RelationshipType::MorphToMany
        } else {
            RelationshipType::BelongsToMany
        }
    }

    fn constrain(&mut self, constraint: EagerConstraint) {
        self.query = constraint(self.query.clone());
    }

    fn with(&mut self, loads: Vec<EagerLoad>) {
        self.query = self.query.clone().with_loads(loads);
    }

    fn add_constraints(&mut self, parent: &Entity) {
        let foreign = self.qualified_foreign_pivot_key();
        let query = self.query.clone().where_eq(&foreign, parent.get(&self.parent_key));
        self.query = self.with_morph_constraint(query);
        self.parent = Some(parent.clone());
    }

    fn add_eager_constraints(&mut self, models: &[Entity]) {
        let foreign = self.qualified_foreign_pivot_key();
        let query = self
            .query
            .clone()
            .where_in(&foreign, unique_keys(models, &self.parent_key));
        self.query = self.with_morph_constraint(query);
    }

    fn init_relation(&self, models: &mut [Entity], relation: &str) {
        for model in models.iter_mut() {
            model.set_relation(relation, RelationValue::Many(Collection::empty()));
        }
    }

    fn match_results(&self, models: &mut [Entity], results: Collection, relation: &str) {
        let mut dictionary: HashMap<PrimaryKey, Vec<Entity>> = HashMap::new();
        for result in results {
            if let Some(key) = pivot_of(&result).and_then(|pivot| pivot.key_of(&self.foreign_pivot_key)) {
                dictionary.entry(key).or_default().push(result);
            }
        }

        for model in models.iter_mut() {
            if let Some(matches) = model.key_of(&self.parent_key).and_then(|key| dictionary.get(&key)) {
                model.set_relation(relation, RelationValue::Many(Collection::new(matches.clone())));
            }
        }
    }

    async fn get_results(&self, db: &Database) -> ModelResult<RelationValue> {
        match &self.parent {
            Some(parent) if !parent.get(&self.parent_key).is_null() => {
                Ok(RelationValue::Many(self.get_eager(db).await?))
            }
            _ => Ok(RelationValue::Many(Collection::empty())),
        }
    }

    async fn get_eager(&self, db: &Database) -> ModelResult<Collection> {
        debug!(relation = %self.name, table = %self.table, "Loading many-to-many relation");
        let mut results = self.select_query().get(db).await?;
        self.hydrate_pivot_relations(&mut results);
        Ok(results)
    }

    fn existence_query(&self, parent: &EntityType) -> ModelResult<ModelQuery> {
        let parent_key = parent.qualify_column(&self.parent_key);
        let related = self.query.entity_type().clone();

        let query = if related.table() == parent.table() {
            let hash = relation_count_hash();
            let from = format!("{} as {}", related.table(), hash);
            let alias = Arc::new(related.aliased(&hash));
            let pivot_related = format!("{}.{}", self.table, self.related_pivot_key);
            let key = alias.qualified_key_name();
            ModelQuery::new(self.query.registry().clone(), alias)
                .tap(|q| q.from(&from).join(&self.table, &key, "=", &pivot_related))
        } else {
            ModelQuery::new(self.query.registry().clone(), related.clone()).tap(|q| {
                q.join(
                    &self.table,
                    &related.qualified_key_name(),
                    "=",
                    &format!("{}.{}", self.table, self.related_pivot_key),
                )
            })
        };

        let query = query.where_column(&self.qualified_foreign_pivot_key(), "=", &parent_key);
        Ok(self.with_morph_constraint(query))
    }
}

/// Pivot entity attached to a many-to-many result
pub fn pivot_of(model: &Entity) -> Option<&Entity> {
    model.relation("pivot").and_then(|pivot| pivot.as_one())
}
