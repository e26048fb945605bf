//! Query Builder ORDER BY, GROUP BY, HAVING operations

use serde_json::Value;

use super::builder::Query;
use super::types::*;

impl Query {
    fn push_order(mut self, order: OrderClause) -> Self {
        if self.unions.is_empty() {
            self.orders.push(order);
        } else {
            self.union_orders.push(order);
        }
        self
    }

    /// Add ORDER BY clause
    pub fn order_by(self, column: &str, direction: &str) -> Self {
        self.push_order(OrderClause::Column {
            column: column.to_string(),
            direction: OrderDirection::parse(direction),
        })
    }

    /// Add ORDER BY clause (ascending)
    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, "asc")
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, "desc")
    }

    /// Add a raw ORDER BY fragment
    pub fn order_by_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_order(OrderClause::Raw { sql: sql.to_string(), bindings })
    }

    /// Newest first by the given column
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    /// Oldest first by the given column
    pub fn oldest(self, column: &str) -> Self {
        self.order_by_asc(column)
    }

    /// Order rows randomly using the dialect's random function
    pub fn in_random_order(self, function: &str) -> Self {
        self.order_by_raw(function, Vec::new())
    }

    /// Add GROUP BY clause
    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add HAVING clause
    pub fn having<T: Into<QueryValue>>(mut self, column: &str, operator: &str, value: T) -> Self {
        self.havings.push(Having {
            boolean: Boolean::And,
            kind: HavingKind::Basic {
                column: column.to_string(),
                operator: normalize_operator(operator),
                value: value.into(),
            },
        });
        self
    }

    pub fn or_having<T: Into<QueryValue>>(mut self, column: &str, operator: &str, value: T) -> Self {
        self.havings.push(Having {
            boolean: Boolean::Or,
            kind: HavingKind::Basic {
                column: column.to_string(),
                operator: normalize_operator(operator),
                value: value.into(),
            },
        });
        self
    }

    /// Add a raw HAVING fragment
    pub fn having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.havings.push(Having {
            boolean: Boolean::And,
            kind: HavingKind::Raw { sql: sql.to_string(), bindings },
        });
        self
    }
}
