//! Identifier wrapping
//!
//! Quotes table and column names for the configured dialect. Rules:
//!
//! - raw [`Expression`](crate::query::Expression)s are emitted verbatim;
//! - `*` is never quoted;
//! - `table.column` quotes both parts and prefixes the table;
//! - `expr as alias` wraps both sides separately;
//! - embedded quote characters are doubled.
//!
//! Empty identifiers, identifiers with more than two dotted segments and
//! malformed aliases are rejected with [`ModelError::InvalidIdentifier`].

use super::Grammar;
use crate::error::{ModelError, ModelResult};
use crate::query::{Column, QueryValue};

impl Grammar {
    /// Wrap a table name, applying the table prefix
    pub fn wrap_table(&self, table: &str) -> ModelResult<String> {
        self.wrap_segments(table, true)
    }

    /// Wrap a column reference
    pub fn wrap(&self, value: &str) -> ModelResult<String> {
        self.wrap_segments(value, false)
    }

    /// Wrap a select/group column, passing raw expressions through
    pub fn wrap_column(&self, column: &Column) -> ModelResult<String> {
        match column {
            Column::Name(name) => self.wrap(name),
            Column::Raw(expression) => Ok(expression.value().to_string()),
        }
    }

    /// Quote a single identifier segment
    pub fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_string();
        }
        let quote = self.quote.to_string();
        let escaped = value.replace(self.quote, &format!("{0}{0}", self.quote));
        format!("{quote}{escaped}{quote}")
    }

    /// Comma-separated wrapped column list
    pub fn columnize(&self, columns: &[Column]) -> ModelResult<String> {
        let wrapped = columns
            .iter()
            .map(|c| self.wrap_column(c))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(wrapped.join(", "))
    }

    /// Placeholder for a value, or its raw SQL
    pub fn parameter(&self, value: &QueryValue) -> String {
        match value {
            QueryValue::Bound(_) => "?".to_string(),
            QueryValue::Raw(expression) => expression.value().to_string(),
        }
    }

    /// Comma-separated placeholders
    pub fn parameterize(&self, values: &[QueryValue]) -> String {
        values
            .iter()
            .map(|v| self.parameter(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn wrap_segments(&self, value: &str, is_table: bool) -> ModelResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidIdentifier(value.to_string()));
        }

        if let Some((expression, alias)) = split_alias(trimmed)? {
            return if is_table {
                let table = last_segment(expression);
                let prefixed_alias = format!("{}{}", self.prefix_for(table), alias);
                Ok(format!(
                    "{} as {}",
                    self.wrap_table(expression)?,
                    self.wrap_value(&prefixed_alias)
                ))
            } else {
                Ok(format!("{} as {}", self.wrap(expression)?, self.wrap_value(alias)))
            };
        }

        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.len() > 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(ModelError::InvalidIdentifier(value.to_string()));
        }

        match (segments.as_slice(), is_table) {
            ([table], true) => Ok(self.wrap_value(&format!("{}{}", self.prefix_for(table), table))),
            ([schema, table], true) => Ok(format!(
                "{}.{}",
                self.wrap_value(schema),
                self.wrap_value(&format!("{}{}", self.prefix_for(table), table))
            )),
            ([column], false) => Ok(self.wrap_value(column)),
            ([table, column], false) => Ok(format!("{}.{}", self.wrap_table(table)?, self.wrap_value(column))),
            _ => Err(ModelError::InvalidIdentifier(value.to_string())),
        }
    }
}

fn last_segment(value: &str) -> &str {
    value.rsplit('.').next().unwrap_or(value)
}

/// Split `expr as alias`; `None` when the value carries no alias
fn split_alias(value: &str) -> ModelResult<Option<(&str, &str)>> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let has_as = tokens.iter().any(|t| t.eq_ignore_ascii_case("as"));
    if !has_as {
        return Ok(None);
    }
    match tokens.as_slice() {
        [expression, keyword, alias] if keyword.eq_ignore_ascii_case("as") => {
            Ok(Some((*expression, *alias)))
        }
        _ => Err(ModelError::InvalidIdentifier(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqlDialect;
    use crate::config::OrmConfig;
    use crate::query::raw;

    fn prefixed() -> Grammar {
        Grammar::new(&OrmConfig::new().with_prefix("wp_"))
    }

    #[test]
    fn test_plain_and_dotted_columns() {
        let grammar = Grammar::default();
        assert_eq!(grammar.wrap("name").unwrap(), r#""name""#);
        assert_eq!(grammar.wrap("users.name").unwrap(), r#""users"."name""#);
        assert_eq!(grammar.wrap("users.*").unwrap(), r#""users".*"#);
        assert_eq!(grammar.wrap("*").unwrap(), "*");
    }

    #[test]
    fn test_prefix_applies_to_table_part_only() {
        let grammar = prefixed();
        assert_eq!(grammar.wrap_table("posts").unwrap(), r#""wp_posts""#);
        assert_eq!(grammar.wrap("posts.id").unwrap(), r#""wp_posts"."id""#);
        assert_eq!(grammar.wrap("id").unwrap(), r#""id""#);
    }

    #[test]
    fn test_aliases() {
        let grammar = prefixed();
        assert_eq!(
            grammar.wrap("posts.title as heading").unwrap(),
            r#""wp_posts"."title" as "heading""#
        );
        assert_eq!(
            grammar.wrap_table("posts AS p").unwrap(),
            r#""wp_posts" as "wp_p""#
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let grammar = Grammar::default();
        assert_eq!(grammar.wrap(r#"we"ird"#).unwrap(), r#""we""ird""#);

        let mysql = Grammar::new(&OrmConfig::new().with_dialect(SqlDialect::MySQL));
        assert_eq!(mysql.wrap("a`b").unwrap(), "`a``b`");
    }

    #[test]
    fn test_raw_columns_bypass_wrapping() {
        let grammar = prefixed();
        let column = Column::from(raw("count(*) as total"));
        assert_eq!(grammar.wrap_column(&column).unwrap(), "count(*) as total");
    }

    #[test]
    fn test_global_tables_use_base_prefix_in_multisite() {
        let grammar = Grammar::new(&OrmConfig::new().with_prefix("wp_5_").with_multisite("wp_"));
        assert_eq!(grammar.wrap_table("users").unwrap(), r#""wp_users""#);
        assert_eq!(grammar.wrap_table("usermeta").unwrap(), r#""wp_usermeta""#);
        assert_eq!(grammar.wrap_table("posts").unwrap(), r#""wp_5_posts""#);
        assert_eq!(grammar.wrap("users.ID").unwrap(), r#""wp_users"."ID""#);
    }

    #[test]
    fn test_malformed_identifiers_are_rejected() {
        let grammar = Grammar::default();
        for bad in ["", "   ", "a.b.c", "a..b", ".a", "a as", "a as b as c", "as b"] {
            assert!(
                matches!(grammar.wrap(bad), Err(ModelError::InvalidIdentifier(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parameterize() {
        let grammar = Grammar::default();
        let values = vec![QueryValue::from(1), QueryValue::from(raw("now()")), QueryValue::from("x")];
        assert_eq!(grammar.parameterize(&values), "?, now(), ?");
    }
}
