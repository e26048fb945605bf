//! Query Builder - Core structure, selects and bindings

use serde_json::Value;

use super::joins::JoinClause;
use super::types::*;

/// Structured description of a single SQL statement
///
/// Every list is owned outright and kept in construction order. Predicates
/// carry their own connector; the grammar drops the first one when
/// rendering, never the builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) columns: Option<Vec<Column>>,
    pub(crate) distinct: bool,
    pub(crate) from: Option<String>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<Where>,
    pub(crate) groups: Vec<Column>,
    pub(crate) havings: Vec<Having>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) limit: Option<i64>,
    pub(crate) offset: Option<i64>,
    pub(crate) unions: Vec<Union>,
    pub(crate) union_orders: Vec<OrderClause>,
    pub(crate) union_limit: Option<i64>,
    pub(crate) union_offset: Option<i64>,
    pub(crate) lock: Option<String>,
    pub(crate) select_bindings: Vec<Value>,
}

impl Query {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query against a table
    pub fn table(table: &str) -> Self {
        Self::new().from(table)
    }

    /// Set the table the query targets
    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(table.to_string());
        self
    }

    /// Replace the selected columns, dropping raw select bindings
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self.select_bindings.clear();
        self
    }

    /// Append columns to the selection
    pub fn add_select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.columns
            .get_or_insert_with(Vec::new)
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append a raw select expression with its bindings
    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.columns
            .get_or_insert_with(Vec::new)
            .push(Column::Raw(Expression::new(sql)));
        self.select_bindings.extend(bindings);
        self
    }

    /// Force distinct results
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Pessimistic lock clause appended verbatim
    pub fn lock(mut self, lock: &str) -> Self {
        self.lock = Some(lock.to_string());
        self
    }

    pub fn lock_for_update(self) -> Self {
        self.lock("for update")
    }

    /// Set an aggregate function over the given columns
    pub fn aggregate<I, C>(mut self, function: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.aggregate = Some(Aggregate {
            function: function.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn from_table(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn columns(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    pub fn wheres(&self) -> &[Where] {
        &self.wheres
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Whether any predicate is joined with `or`
    pub fn has_or_wheres(&self) -> bool {
        self.wheres.iter().any(|w| w.boolean == Boolean::Or)
    }

    /// Drop ordering, limit and offset, keeping only what affects row counts
    pub fn without_paging(mut self) -> Self {
        self.orders.clear();
        self.limit = None;
        self.offset = None;
        self
    }

    /// Bindings for the join clauses, in render order
    pub fn join_bindings(&self) -> Vec<Value> {
        self.joins.iter().flat_map(JoinClause::bindings).collect()
    }

    /// Bindings for the where clauses, in render order
    pub fn where_bindings(&self) -> Vec<Value> {
        self.wheres.iter().flat_map(|w| w.kind.bindings()).collect()
    }

    /// All bindings in the order the grammar renders their placeholders
    ///
    /// An aggregate replaces the column list, so select bindings are left out.
    pub fn get_bindings(&self) -> Vec<Value> {
        let mut bindings = if self.aggregate.is_some() {
            Vec::new()
        } else {
            self.select_bindings.clone()
        };
        bindings.extend(self.join_bindings());
        bindings.extend(self.where_bindings());
        bindings.extend(self.havings.iter().flat_map(|h| h.kind.bindings()));
        bindings.extend(self.orders.iter().flat_map(OrderClause::bindings));
        for union in &self.unions {
            bindings.extend(union.query.get_bindings());
        }
        bindings.extend(self.union_orders.iter().flat_map(OrderClause::bindings));
        bindings
    }
}
