//! Query Builder JOIN operations

use serde_json::Value;

use super::builder::Query;
use super::types::*;

/// A joined table with its ordered constraint list
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub clauses: Vec<JoinConstraint>,
}

impl JoinClause {
    pub fn new(join_type: JoinType, table: &str) -> Self {
        Self {
            join_type,
            table: table.to_string(),
            clauses: Vec::new(),
        }
    }

    fn push(mut self, boolean: Boolean, kind: JoinConstraintKind) -> Self {
        self.clauses.push(JoinConstraint { boolean, kind });
        self
    }

    /// Compare two columns
    pub fn on(self, first: &str, operator: &str, second: &str) -> Self {
        self.push(
            Boolean::And,
            JoinConstraintKind::On {
                first: first.to_string(),
                operator: normalize_operator(operator),
                second: second.to_string(),
            },
        )
    }

    pub fn or_on(self, first: &str, operator: &str, second: &str) -> Self {
        self.push(
            Boolean::Or,
            JoinConstraintKind::On {
                first: first.to_string(),
                operator: normalize_operator(operator),
                second: second.to_string(),
            },
        )
    }

    /// Compare a column against a bound value
    pub fn where_<T: Into<QueryValue>>(self, first: &str, operator: &str, value: T) -> Self {
        self.push(
            Boolean::And,
            JoinConstraintKind::Where {
                first: first.to_string(),
                operator: normalize_operator(operator),
                value: value.into(),
            },
        )
    }

    pub fn or_where<T: Into<QueryValue>>(self, first: &str, operator: &str, value: T) -> Self {
        self.push(
            Boolean::Or,
            JoinConstraintKind::Where {
                first: first.to_string(),
                operator: normalize_operator(operator),
                value: value.into(),
            },
        )
    }

    pub fn where_in<I, T>(self, first: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        self.push(
            Boolean::And,
            JoinConstraintKind::WhereIn {
                first: first.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                not: false,
            },
        )
    }

    pub fn where_not_in<I, T>(self, first: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<QueryValue>,
    {
        self.push(
            Boolean::And,
            JoinConstraintKind::WhereIn {
                first: first.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                not: true,
            },
        )
    }

    /// Parenthesized group of constraints
    pub fn nest<F>(self, boolean: Boolean, build: F) -> Self
    where
        F: FnOnce(JoinClause) -> JoinClause,
    {
        let group = build(JoinClause::new(self.join_type, &self.table));
        if group.clauses.is_empty() {
            return self;
        }
        self.push(boolean, JoinConstraintKind::Nested(group.clauses))
    }

    pub fn bindings(&self) -> Vec<Value> {
        self.clauses.iter().flat_map(|c| c.kind.bindings()).collect()
    }
}

impl Query {
    /// Add a join built by a closure
    pub fn join_with<F>(mut self, join_type: JoinType, table: &str, build: F) -> Self
    where
        F: FnOnce(JoinClause) -> JoinClause,
    {
        self.joins.push(build(JoinClause::new(join_type, table)));
        self
    }

    /// Add INNER JOIN to the query
    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(JoinType::Inner, table, |j| j.on(first, operator, second))
    }

    /// Add INNER JOIN comparing a column with a bound value
    pub fn join_where<T: Into<QueryValue>>(self, table: &str, first: &str, operator: &str, value: T) -> Self {
        self.join_with(JoinType::Inner, table, |j| j.where_(first, operator, value))
    }

    /// Add LEFT JOIN to the query
    pub fn left_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(JoinType::Left, table, |j| j.on(first, operator, second))
    }

    /// Add RIGHT JOIN to the query
    pub fn right_join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.join_with(JoinType::Right, table, |j| j.on(first, operator, second))
    }

    /// Add CROSS JOIN to the query
    pub fn cross_join(mut self, table: &str) -> Self {
        self.joins.push(JoinClause::new(JoinType::Cross, table));
        self
    }
}
