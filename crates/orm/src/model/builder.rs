//! Entity-aware query builder
//!
//! [`ModelQuery`] wraps a [`Query`] against one entity type. It applies the
//! type's global scopes when the query runs, hydrates rows into entities and
//! eager loads requested relations.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::entity::Entity;
use super::entity_type::EntityType;
use super::soft_deletes::{GlobalScope, ScopeExtension};
use crate::collection::Collection;
use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::grammar::Record;
use crate::pagination::LengthAwarePaginator;
use crate::query::{Column, Query, QueryValue};
use crate::relationships::eager_loading::{eager_load_relations, make_relation, parse_with_relations};
use crate::relationships::{EagerLoad, RelationshipRegistry};

/// Query against a registered entity type
#[derive(Debug, Clone)]
pub struct ModelQuery {
    registry: RelationshipRegistry,
    entity_type: Arc<EntityType>,
    query: Query,
    eager_loads: Vec<EagerLoad>,
    removed_scopes: Vec<GlobalScope>,
}

impl ModelQuery {
    pub fn new(registry: RelationshipRegistry, entity_type: Arc<EntityType>) -> Self {
        let query = Query::table(entity_type.table());
        Self {
            registry,
            entity_type,
            query,
            eager_loads: Vec::new(),
            removed_scopes: Vec::new(),
        }
    }

    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Underlying query, without global scopes
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager_loads
    }

    /// Transform the underlying query
    pub fn tap<F>(mut self, build: F) -> Self
    where
        F: FnOnce(Query) -> Query,
    {
        self.query = build(self.query);
        self
    }

    pub fn select<I, C>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.tap(|q| q.select(columns))
    }

    pub fn where_eq<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.tap(|q| q.where_eq(column, value))
    }

    pub fn or_where_eq<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.tap(|q| q.or_where_eq(column, value))
    }

    pub fn where_op<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.tap(|q| q.where_op(column, operator, value))
    }

    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        self.tap(|q| q.where_in(column, values))
    }

    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        self.tap(|q| q.where_not_in(column, values))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.tap(|q| q.where_null(column))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.tap(|q| q.where_not_null(column))
    }

    pub fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.tap(|q| q.where_column(first, operator, second))
    }

    pub fn where_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Query) -> Query,
    {
        self.tap(|q| q.where_nested(build))
    }

    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.tap(|q| q.where_raw(sql, bindings))
    }

    pub fn order_by(self, column: &str, direction: &str) -> Self {
        self.tap(|q| q.order_by(column, direction))
    }

    /// Newest first by the creation timestamp
    pub fn latest(self) -> Self {
        let column = self.entity_type.created_at_column().to_string();
        self.tap(|q| q.latest(&column))
    }

    pub fn oldest(self) -> Self {
        let column = self.entity_type.created_at_column().to_string();
        self.tap(|q| q.oldest(&column))
    }

    pub fn limit(self, count: i64) -> Self {
        self.tap(|q| q.limit(count))
    }

    pub fn offset(self, count: i64) -> Self {
        self.tap(|q| q.offset(count))
    }

    pub fn for_page(self, page: i64, per_page: i64) -> Self {
        self.tap(|q| q.for_page(page, per_page))
    }

    /// Relations to eager load; nested names use dots (`posts.comments`)
    pub fn with(self, relations: &[&str]) -> Self {
        let loads = relations.iter().map(|name| EagerLoad::new(name)).collect();
        self.with_loads(loads)
    }

    /// Eager load `relation`, constraining its query
    pub fn with_constraint<F>(self, relation: &str, constraint: F) -> Self
    where
        F: Fn(ModelQuery) -> ModelQuery + Send + Sync + 'static,
    {
        self.with_loads(vec![EagerLoad::constrained(relation, constraint)])
    }

    pub fn with_loads(mut self, loads: Vec<EagerLoad>) -> Self {
        self.eager_loads = parse_with_relations(&self.eager_loads, loads);
        self
    }

    pub fn without_global_scope(mut self, scope: GlobalScope) -> Self {
        if !self.removed_scopes.contains(&scope) {
            self.removed_scopes.push(scope);
        }
        self
    }

    pub fn without_global_scopes(mut self) -> Self {
        for scope in self.entity_type.global_scopes() {
            if !self.removed_scopes.contains(&scope) {
                self.removed_scopes.push(scope);
            }
        }
        self
    }

    pub fn removed_scopes(&self) -> &[GlobalScope] {
        &self.removed_scopes
    }

    /// The query with remaining global scopes applied
    ///
    /// Existing wheres joined with `or` are grouped first so the scope
    /// narrows the whole condition.
    pub fn to_base(&self) -> Query {
        let scopes: Vec<GlobalScope> = self
            .entity_type
            .global_scopes()
            .into_iter()
            .filter(|scope| !self.removed_scopes.contains(scope))
            .collect();

        let mut query = self.query.clone();
        if scopes.is_empty() {
            return query;
        }
        if query.has_or_wheres() {
            query = query.group_existing_wheres();
        }
        for scope in scopes {
            query = scope.apply(query, &self.entity_type);
        }
        query
    }

    fn ensure_extension(&self, extension: ScopeExtension) -> ModelResult<()> {
        if self.entity_type.supports_extension(extension) {
            Ok(())
        } else {
            Err(ModelError::Logic(format!(
                "{} is not available on {} queries",
                extension,
                self.entity_type.name()
            )))
        }
    }

    /// Apply a non-terminal scope extension
    pub fn extend(self, extension: ScopeExtension) -> ModelResult<Self> {
        match extension {
            ScopeExtension::WithTrashed => self.with_trashed(),
            ScopeExtension::WithoutTrashed => self.without_trashed(),
            ScopeExtension::OnlyTrashed => self.only_trashed(),
            ScopeExtension::ForceDelete | ScopeExtension::Restore => Err(ModelError::Logic(format!(
                "{} executes a statement and cannot be chained",
                extension
            ))),
        }
    }

    /// Include soft-deleted rows
    pub fn with_trashed(self) -> ModelResult<Self> {
        self.ensure_extension(ScopeExtension::WithTrashed)?;
        Ok(self.without_global_scope(GlobalScope::SoftDeleting))
    }

    /// Exclude soft-deleted rows explicitly
    pub fn without_trashed(self) -> ModelResult<Self> {
        self.ensure_extension(ScopeExtension::WithoutTrashed)?;
        let column = self.entity_type.qualified_deleted_at_column();
        Ok(self.without_global_scope(GlobalScope::SoftDeleting).where_null(&column))
    }

    /// Only soft-deleted rows
    pub fn only_trashed(self) -> ModelResult<Self> {
        self.ensure_extension(ScopeExtension::OnlyTrashed)?;
        let column = self.entity_type.qualified_deleted_at_column();
        Ok(self.without_global_scope(GlobalScope::SoftDeleting).where_not_null(&column))
    }

    /// Fetch and hydrate rows, without eager loading
    pub async fn get_models(&self, db: &Database) -> ModelResult<Vec<Entity>> {
        let rows = db.select(&self.to_base()).await?;
        Ok(rows
            .into_iter()
            .map(|row| Entity::from_row(self.entity_type.clone(), row))
            .collect())
    }

    /// Eager load this query's requested relations onto `models`
    pub async fn eager_load_relations(&self, db: &Database, models: &mut [Entity]) -> ModelResult<()> {
        eager_load_relations(db, &self.registry, &self.entity_type, &self.eager_loads, models).await
    }

    pub async fn get(&self, db: &Database) -> ModelResult<Collection> {
        let mut models = self.get_models(db).await?;
        if !models.is_empty() && !self.eager_loads.is_empty() {
            self.eager_load_relations(db, &mut models).await?;
        }
        Ok(Collection::new(models))
    }

    pub async fn first(&self, db: &Database) -> ModelResult<Option<Entity>> {
        let results = self.clone().limit(1).get(db).await?;
        Ok(results.into_vec().into_iter().next())
    }

    pub async fn first_or_fail(&self, db: &Database) -> ModelResult<Entity> {
        self.first(db)
            .await?
            .ok_or_else(|| ModelError::not_found(self.entity_type.name()))
    }

    pub async fn find<T: Into<QueryValue>>(&self, db: &Database, key: T) -> ModelResult<Option<Entity>> {
        let column = self.entity_type.qualified_key_name();
        self.clone().where_eq(&column, key).first(db).await
    }

    pub async fn find_or_fail<T: Into<QueryValue>>(&self, db: &Database, key: T) -> ModelResult<Entity> {
        self.find(db, key)
            .await?
            .ok_or_else(|| ModelError::not_found(self.entity_type.name()))
    }

    pub async fn find_many<I, T>(&self, db: &Database, keys: I) -> ModelResult<Collection>
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        let keys: Vec<QueryValue> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Ok(Collection::empty());
        }
        let column = self.entity_type.qualified_key_name();
        self.clone().where_in(&column, keys).get(db).await
    }

    /// Values of one column across matching rows
    pub async fn pluck(&self, db: &Database, column: &str) -> ModelResult<Vec<Value>> {
        let query = self.to_base().select([column]);
        let rows = db.select(&query).await?;
        let key = column.rsplit('.').next().unwrap_or(column);
        Ok(rows
            .into_iter()
            .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
            .collect())
    }

    pub async fn count(&self, db: &Database) -> ModelResult<u64> {
        let query = self.to_base().without_paging().aggregate("count", ["*"]);
        let rows = db.select(&query).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("aggregate"))
            .map(aggregate_count)
            .unwrap_or(0))
    }

    pub async fn exists(&self, db: &Database) -> ModelResult<bool> {
        db.exists(&self.to_base()).await
    }

    /// One page of results plus the total count
    ///
    /// `per_page` defaults to the entity type's page size, then the
    /// configured one; `page` defaults to 1.
    pub async fn paginate(&self, db: &Database, per_page: Option<u32>, page: Option<i64>) -> ModelResult<LengthAwarePaginator> {
        let per_page = per_page
            .or_else(|| self.entity_type.per_page())
            .unwrap_or(db.config().per_page)
            .max(1);
        let page = LengthAwarePaginator::resolve_current_page(page);

        let total = self.count(db).await?;
        let items = if total == 0 {
            Collection::empty()
        } else {
            self.clone().for_page(page, i64::from(per_page)).get(db).await?
        };

        Ok(LengthAwarePaginator::new(items, total, per_page, Some(page)))
    }

    pub async fn insert(&self, db: &Database, records: &[Record]) -> ModelResult<u64> {
        db.insert(&self.query, records).await
    }

    /// Update matching rows, touching `updated_at` when timestamps are on
    pub async fn update(&self, db: &Database, mut values: Record) -> ModelResult<u64> {
        if self.entity_type.uses_timestamps() {
            let column = self.entity_type.updated_at_column().to_string();
            values
                .entry(column)
                .or_insert_with(|| QueryValue::from(db.fresh_timestamp()));
        }
        db.update(&self.to_base(), &values).await
    }

    /// Delete matching rows; soft-deleting types set the deletion column
    pub async fn delete(&self, db: &Database) -> ModelResult<u64> {
        if !self.entity_type.soft_deletes() {
            return db.delete(&self.to_base()).await;
        }

        let column = if self.query.has_joins() {
            self.entity_type.qualified_deleted_at_column()
        } else {
            self.entity_type.deleted_at_column().to_string()
        };
        debug!(model = self.entity_type.name(), "Soft deleting rows");

        let mut values = Record::new();
        values.insert(column, QueryValue::from(db.fresh_timestamp()));
        self.update(db, values).await
    }

    /// Delete matching rows for real, trashed ones included
    pub async fn force_delete(&self, db: &Database) -> ModelResult<u64> {
        self.ensure_extension(ScopeExtension::ForceDelete)?;
        let query = self.clone().without_global_scope(GlobalScope::SoftDeleting);
        db.delete(&query.to_base()).await
    }

    /// Clear the deletion column on matching rows, trashed included
    pub async fn restore(&self, db: &Database) -> ModelResult<u64> {
        self.ensure_extension(ScopeExtension::Restore)?;
        let column = self.entity_type.deleted_at_column().to_string();
        let mut values = Record::new();
        values.insert(column, QueryValue::from(Value::Null));
        self.clone().with_trashed()?.update(db, values).await
    }

    /// Rows with at least one related row
    pub fn has(self, relation: &str) -> ModelResult<Self> {
        self.add_has_where(relation, false, None::<fn(ModelQuery) -> ModelQuery>)
    }

    pub fn doesnt_have(self, relation: &str) -> ModelResult<Self> {
        self.add_has_where(relation, true, None::<fn(ModelQuery) -> ModelQuery>)
    }

    /// Rows with at least one related row matching `constraint`
    pub fn where_has<F>(self, relation: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        self.add_has_where(relation, false, Some(constraint))
    }

    pub fn where_doesnt_have<F>(self, relation: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        self.add_has_where(relation, true, Some(constraint))
    }

    fn add_has_where<F>(self, relation: &str, negate: bool, constraint: Option<F>) -> ModelResult<Self>
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        let metadata = self.registry.get(self.entity_type.name(), relation)?;
        let related = make_relation(&self.registry, &self.entity_type, &metadata)?;
        let mut existence = related.existence_query(&self.entity_type)?;
        if let Some(constraint) = constraint {
            existence = constraint(existence);
        }

        let subquery = existence.to_base();
        Ok(self.tap(|q| if negate { q.where_not_exists(subquery) } else { q.where_exists(subquery) }))
    }
}

/// Drivers return counts as integers, floats or numeric strings
fn aggregate_count(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::relationships::RelationshipMetadata;
    use serde_json::json;

    fn registry() -> RelationshipRegistry {
        let registry = RelationshipRegistry::new();
        registry.register_entity(EntityType::new("User", "users"));
        registry.register_entity(EntityType::new("Post", "posts").with_soft_deletes());
        registry
            .register("User", RelationshipMetadata::has_many("posts", "Post", "user_id", "id"))
            .unwrap();
        registry
    }

    fn query(name: &str) -> ModelQuery {
        let registry = registry();
        let entity_type = registry.entity_type(name).unwrap();
        ModelQuery::new(registry, entity_type)
    }

    fn sql(query: &ModelQuery) -> String {
        Grammar::default().compile_select(&query.to_base()).unwrap()
    }

    #[test]
    fn test_soft_delete_scope_is_applied() {
        assert_eq!(sql(&query("Post")), r#"select * from "posts" where "posts"."deleted_at" is null"#);
        assert_eq!(sql(&query("Post").with_trashed().unwrap()), r#"select * from "posts""#);
        assert_eq!(
            sql(&query("Post").only_trashed().unwrap()),
            r#"select * from "posts" where "posts"."deleted_at" is not null"#
        );
    }

    #[test]
    fn test_scope_groups_existing_or_wheres() {
        let posts = query("Post").where_eq("a", 1).or_where_eq("b", 2);
        assert_eq!(
            sql(&posts),
            r#"select * from "posts" where ("a" = ? or "b" = ?) and "posts"."deleted_at" is null"#
        );
    }

    #[test]
    fn test_extensions_require_soft_deletes() {
        assert!(matches!(query("User").with_trashed(), Err(ModelError::Logic(_))));
        assert!(query("Post").extend(ScopeExtension::Restore).is_err());
    }

    #[test]
    fn test_has_uses_exists_subquery_with_related_scopes() {
        let users = query("User").where_has("posts", |posts| posts.where_eq("posts.published", true)).unwrap();
        assert_eq!(
            sql(&users),
            r#"select * from "users" where exists (select * from "posts" where "posts"."user_id" = "users"."id" and "posts"."published" = ? and "posts"."deleted_at" is null)"#
        );
        assert_eq!(users.to_base().get_bindings(), vec![json!(true)]);

        assert!(matches!(query("User").has("comments"), Err(ModelError::UnknownRelation { .. })));
    }

    #[test]
    fn test_aggregate_count_accepts_driver_shapes() {
        assert_eq!(aggregate_count(&json!(3)), 3);
        assert_eq!(aggregate_count(&json!("12")), 12);
        assert_eq!(aggregate_count(&json!(2.0)), 2);
        assert_eq!(aggregate_count(&Value::Null), 0);
    }
}
