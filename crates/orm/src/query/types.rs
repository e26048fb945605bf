//! Query Builder Types - Core types and enums for query building

use std::fmt;

use serde_json::Value;

use super::builder::Query;

/// Operators accepted by basic comparisons
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "like", "like binary", "not like", "between", "ilike",
    "&", "|", "^", "<<", ">>", "rlike", "regexp", "not regexp", "~", "~*", "!~", "!~*",
    "similar to", "not similar to",
];

/// Normalize an operator, falling back to equality for unknown input
pub fn normalize_operator(operator: &str) -> String {
    let lowered = operator.trim().to_lowercase();
    if OPERATORS.contains(&lowered.as_str()) {
        lowered
    } else {
        "=".to_string()
    }
}

/// Raw SQL fragment that bypasses wrapping and parameter binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(String);

impl Expression {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`Expression::new`]
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(sql)
}

/// A value placed in a query: bound as a parameter, or inlined raw
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Bound(Value),
    Raw(Expression),
}

impl QueryValue {
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Bound(Value::Null))
    }

    /// The parameter this value contributes, if any
    pub fn binding(&self) -> Option<&Value> {
        match self {
            QueryValue::Bound(value) => Some(value),
            QueryValue::Raw(_) => None,
        }
    }
}

impl From<Expression> for QueryValue {
    fn from(expression: Expression) -> Self {
        QueryValue::Raw(expression)
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        QueryValue::Bound(value)
    }
}

impl From<&Value> for QueryValue {
    fn from(value: &Value) -> Self {
        QueryValue::Bound(value.clone())
    }
}

macro_rules! bound_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::Bound(Value::from(value))
                }
            }
        )*
    };
}

bound_from!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &str);

impl<T> From<Option<T>> for QueryValue
where
    T: Into<QueryValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => QueryValue::Bound(Value::Null),
        }
    }
}

/// A column in a select list or group clause
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Name(String),
    Raw(Expression),
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Name(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::Name(name)
    }
}

impl From<&String> for Column {
    fn from(name: &String) -> Self {
        Column::Name(name.clone())
    }
}

impl From<Expression> for Column {
    fn from(expression: Expression) -> Self {
        Column::Raw(expression)
    }
}

/// Connector joining a predicate to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boolean::And => write!(f, "and"),
            Boolean::Or => write!(f, "or"),
        }
    }
}

/// Date component compared by a date-based where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatePart::Date => write!(f, "date"),
            DatePart::Time => write!(f, "time"),
            DatePart::Day => write!(f, "day"),
            DatePart::Month => write!(f, "month"),
            DatePart::Year => write!(f, "year"),
        }
    }
}

/// A where predicate with its connector
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    pub boolean: Boolean,
    pub kind: WhereKind,
}

/// Tagged where predicate variants
#[derive(Debug, Clone, PartialEq)]
pub enum WhereKind {
    Basic {
        column: String,
        operator: String,
        value: QueryValue,
    },
    Column {
        first: String,
        operator: String,
        second: String,
    },
    Between {
        column: String,
        low: QueryValue,
        high: QueryValue,
        not: bool,
    },
    In {
        column: String,
        values: Vec<QueryValue>,
    },
    NotIn {
        column: String,
        values: Vec<QueryValue>,
    },
    InSub {
        column: String,
        query: Box<Query>,
    },
    NotInSub {
        column: String,
        query: Box<Query>,
    },
    Null {
        column: String,
    },
    NotNull {
        column: String,
    },
    Date {
        part: DatePart,
        column: String,
        operator: String,
        value: QueryValue,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
    Nested {
        query: Box<Query>,
    },
    Sub {
        column: String,
        operator: String,
        query: Box<Query>,
    },
    Exists {
        query: Box<Query>,
    },
    NotExists {
        query: Box<Query>,
    },
}

impl WhereKind {
    /// Parameters contributed by this predicate, in render order
    pub fn bindings(&self) -> Vec<Value> {
        match self {
            WhereKind::Basic { value, .. } | WhereKind::Date { value, .. } => {
                value.binding().cloned().into_iter().collect()
            }
            WhereKind::Between { low, high, .. } => [low, high]
                .into_iter()
                .filter_map(|v| v.binding().cloned())
                .collect(),
            WhereKind::In { values, .. } | WhereKind::NotIn { values, .. } => {
                values.iter().filter_map(|v| v.binding().cloned()).collect()
            }
            WhereKind::Raw { bindings, .. } => bindings.clone(),
            WhereKind::InSub { query, .. }
            | WhereKind::NotInSub { query, .. }
            | WhereKind::Sub { query, .. }
            | WhereKind::Exists { query }
            | WhereKind::NotExists { query } => query.get_bindings(),
            WhereKind::Nested { query } => query
                .wheres
                .iter()
                .flat_map(|w| w.kind.bindings())
                .collect(),
            WhereKind::Column { .. } | WhereKind::Null { .. } | WhereKind::NotNull { .. } => Vec::new(),
        }
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "inner"),
            JoinType::Left => write!(f, "left"),
            JoinType::Right => write!(f, "right"),
            JoinType::Cross => write!(f, "cross"),
        }
    }
}

/// A single constraint inside a join's `on` list
#[derive(Debug, Clone, PartialEq)]
pub struct JoinConstraint {
    pub boolean: Boolean,
    pub kind: JoinConstraintKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraintKind {
    /// Column-to-column comparison
    On {
        first: String,
        operator: String,
        second: String,
    },
    /// Comparison against a bound value
    Where {
        first: String,
        operator: String,
        value: QueryValue,
    },
    /// Membership test expanding to one placeholder per value
    WhereIn {
        first: String,
        values: Vec<QueryValue>,
        not: bool,
    },
    /// Parenthesized group of constraints
    Nested(Vec<JoinConstraint>),
}

impl JoinConstraintKind {
    pub fn bindings(&self) -> Vec<Value> {
        match self {
            JoinConstraintKind::On { .. } => Vec::new(),
            JoinConstraintKind::Where { value, .. } => value.binding().cloned().into_iter().collect(),
            JoinConstraintKind::WhereIn { values, .. } => {
                values.iter().filter_map(|v| v.binding().cloned()).collect()
            }
            JoinConstraintKind::Nested(clauses) => {
                clauses.iter().flat_map(|c| c.kind.bindings()).collect()
            }
        }
    }
}

/// Having clause
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    pub boolean: Boolean,
    pub kind: HavingKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HavingKind {
    Basic {
        column: String,
        operator: String,
        value: QueryValue,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

impl HavingKind {
    pub fn bindings(&self) -> Vec<Value> {
        match self {
            HavingKind::Basic { value, .. } => value.binding().cloned().into_iter().collect(),
            HavingKind::Raw { bindings, .. } => bindings.clone(),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    /// Parse a direction, treating anything but `desc` as ascending
    pub fn parse(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "asc"),
            OrderDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Order clause
#[derive(Debug, Clone, PartialEq)]
pub enum OrderClause {
    Column {
        column: String,
        direction: OrderDirection,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

impl OrderClause {
    pub fn bindings(&self) -> Vec<Value> {
        match self {
            OrderClause::Column { .. } => Vec::new(),
            OrderClause::Raw { bindings, .. } => bindings.clone(),
        }
    }
}

/// Aggregate function call replacing the column list
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<Column>,
}

/// Unioned query
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub query: Box<Query>,
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_fallback() {
        assert_eq!(normalize_operator("LIKE"), "like");
        assert_eq!(normalize_operator(">="), ">=");
        assert_eq!(normalize_operator("drop table"), "=");
    }

    #[test]
    fn test_raw_values_have_no_binding() {
        assert_eq!(QueryValue::from(raw("now()")).binding(), None);
        assert_eq!(QueryValue::from(5).binding(), Some(&Value::from(5)));
        assert!(QueryValue::from(None::<i64>).is_null());
    }
}
