//! Query Builder WHERE clause operations

use serde_json::Value;

use super::builder::Query;
use super::types::*;

impl Query {
    fn push_where(mut self, boolean: Boolean, kind: WhereKind) -> Self {
        self.wheres.push(Where { boolean, kind });
        self
    }

    fn compare(self, boolean: Boolean, column: &str, operator: &str, value: QueryValue) -> Self {
        let operator = normalize_operator(operator);

        // Comparing against null only makes sense as a null check
        if value.is_null() {
            return match operator.as_str() {
                "=" => self.push_where(boolean, WhereKind::Null { column: column.to_string() }),
                "!=" | "<>" => self.push_where(boolean, WhereKind::NotNull { column: column.to_string() }),
                _ => self.push_where(
                    boolean,
                    WhereKind::Basic { column: column.to_string(), operator, value },
                ),
            };
        }

        self.push_where(boolean, WhereKind::Basic { column: column.to_string(), operator, value })
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.compare(Boolean::And, column, "=", value.into())
    }

    /// Add OR WHERE condition with equality
    pub fn or_where_eq<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.compare(Boolean::Or, column, "=", value.into())
    }

    /// Add WHERE condition with custom operator
    ///
    /// Unknown operators fall back to `=`.
    pub fn where_op<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.compare(Boolean::And, column, operator, value.into())
    }

    /// Add OR WHERE condition with custom operator
    pub fn or_where_op<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.compare(Boolean::Or, column, operator, value.into())
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "!=", value)
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, ">", value)
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, ">=", value)
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "<", value)
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<QueryValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "<=", value)
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, "like", pattern)
    }

    /// Compare two columns
    pub fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Column {
                first: first.to_string(),
                operator: normalize_operator(operator),
                second: second.to_string(),
            },
        )
    }

    pub fn or_where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_where(
            Boolean::Or,
            WhereKind::Column {
                first: first.to_string(),
                operator: normalize_operator(operator),
                second: second.to_string(),
            },
        )
    }

    fn between(
        self,
        boolean: Boolean,
        column: &str,
        low: QueryValue,
        high: QueryValue,
        not: bool,
    ) -> Self {
        self.push_where(
            boolean,
            WhereKind::Between { column: column.to_string(), low, high, not },
        )
    }

    /// Add WHERE BETWEEN condition
    pub fn where_between<L, H>(self, column: &str, low: L, high: H) -> Self
    where
        L: Into<QueryValue>,
        H: Into<QueryValue>,
    {
        self.between(Boolean::And, column, low.into(), high.into(), false)
    }

    pub fn or_where_between<L, H>(self, column: &str, low: L, high: H) -> Self
    where
        L: Into<QueryValue>,
        H: Into<QueryValue>,
    {
        self.between(Boolean::Or, column, low.into(), high.into(), false)
    }

    /// Add WHERE NOT BETWEEN condition
    pub fn where_not_between<L, H>(self, column: &str, low: L, high: H) -> Self
    where
        L: Into<QueryValue>,
        H: Into<QueryValue>,
    {
        self.between(Boolean::And, column, low.into(), high.into(), true)
    }

    /// Add WHERE IN condition
    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Boolean::And, WhereKind::In { column: column.to_string(), values })
    }

    pub fn or_where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Boolean::Or, WhereKind::In { column: column.to_string(), values })
    }

    /// Add WHERE NOT IN condition
    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Boolean::And, WhereKind::NotIn { column: column.to_string(), values })
    }

    pub fn or_where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(Boolean::Or, WhereKind::NotIn { column: column.to_string(), values })
    }

    /// Add WHERE IN (sub-select) condition
    pub fn where_in_sub(self, column: &str, query: Query) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::InSub { column: column.to_string(), query: Box::new(query) },
        )
    }

    /// Add WHERE NOT IN (sub-select) condition
    pub fn where_not_in_sub(self, column: &str, query: Query) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::NotInSub { column: column.to_string(), query: Box::new(query) },
        )
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(self, column: &str) -> Self {
        self.push_where(Boolean::And, WhereKind::Null { column: column.to_string() })
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_where(Boolean::Or, WhereKind::Null { column: column.to_string() })
    }

    /// Add WHERE IS NOT NULL condition
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_where(Boolean::And, WhereKind::NotNull { column: column.to_string() })
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.push_where(Boolean::Or, WhereKind::NotNull { column: column.to_string() })
    }

    fn date_based<T: Into<QueryValue>>(self, part: DatePart, column: &str, operator: &str, value: T) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Date {
                part,
                column: column.to_string(),
                operator: normalize_operator(operator),
                value: value.into(),
            },
        )
    }

    /// Compare the date part of a column
    pub fn where_date<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.date_based(DatePart::Date, column, operator, value)
    }

    pub fn where_time<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.date_based(DatePart::Time, column, operator, value)
    }

    pub fn where_day<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.date_based(DatePart::Day, column, operator, value)
    }

    pub fn where_month<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.date_based(DatePart::Month, column, operator, value)
    }

    pub fn where_year<T: Into<QueryValue>>(self, column: &str, operator: &str, value: T) -> Self {
        self.date_based(DatePart::Year, column, operator, value)
    }

    /// Add a raw WHERE fragment with its bindings
    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(Boolean::And, WhereKind::Raw { sql: sql.to_string(), bindings })
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(Boolean::Or, WhereKind::Raw { sql: sql.to_string(), bindings })
    }

    /// Empty query sharing this query's table, for building nested groups
    pub fn for_nested_where(&self) -> Query {
        let mut query = Query::new();
        query.from = self.from.clone();
        query
    }

    /// Add a pre-built nested group; empty groups are ignored
    pub fn add_nested_where_query(self, query: Query, boolean: Boolean) -> Self {
        if query.wheres.is_empty() {
            return self;
        }
        self.push_where(boolean, WhereKind::Nested { query: Box::new(query) })
    }

    /// Add a parenthesized group of predicates
    pub fn where_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Query) -> Query,
    {
        let nested = build(self.for_nested_where());
        self.add_nested_where_query(nested, Boolean::And)
    }

    pub fn or_where_nested<F>(self, build: F) -> Self
    where
        F: FnOnce(Query) -> Query,
    {
        let nested = build(self.for_nested_where());
        self.add_nested_where_query(nested, Boolean::Or)
    }

    /// Compare a column against a scalar sub-select
    pub fn where_sub(self, column: &str, operator: &str, query: Query) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Sub {
                column: column.to_string(),
                operator: normalize_operator(operator),
                query: Box::new(query),
            },
        )
    }

    /// Add WHERE EXISTS condition
    pub fn where_exists(self, query: Query) -> Self {
        self.push_where(Boolean::And, WhereKind::Exists { query: Box::new(query) })
    }

    pub fn or_where_exists(self, query: Query) -> Self {
        self.push_where(Boolean::Or, WhereKind::Exists { query: Box::new(query) })
    }

    /// Add WHERE NOT EXISTS condition
    pub fn where_not_exists(self, query: Query) -> Self {
        self.push_where(Boolean::And, WhereKind::NotExists { query: Box::new(query) })
    }

    pub fn or_where_not_exists(self, query: Query) -> Self {
        self.push_where(Boolean::Or, WhereKind::NotExists { query: Box::new(query) })
    }

    /// Wrap every existing predicate in a single nested group
    pub(crate) fn group_existing_wheres(mut self) -> Self {
        if self.wheres.is_empty() {
            return self;
        }
        let mut nested = self.for_nested_where();
        nested.wheres = std::mem::take(&mut self.wheres);
        self.add_nested_where_query(nested, Boolean::And)
    }
}
