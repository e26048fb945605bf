//! SELECT compilation
//!
//! Components render in a fixed order: aggregate, columns, from, joins,
//! wheres, groups, havings, orders, limit, offset, unions, lock. Empty
//! fragments are skipped and the rest are joined by single spaces.

use super::Grammar;
use crate::error::ModelResult;
use crate::query::*;

/// Strip a single leading `and `/`or ` connector
pub fn remove_leading_boolean(sql: &str) -> &str {
    for connector in ["and ", "or "] {
        match sql.get(..connector.len()) {
            Some(head) if head.eq_ignore_ascii_case(connector) => return &sql[connector.len()..],
            _ => {}
        }
    }
    sql
}

impl Grammar {
    /// Compile a select query into SQL
    ///
    /// The query is only read. A missing column list renders as `*`.
    pub fn compile_select(&self, query: &Query) -> ModelResult<String> {
        let star = [Column::Name("*".to_string())];
        let columns: &[Column] = match query.columns.as_deref() {
            Some(columns) if !columns.is_empty() => columns,
            _ => &star,
        };

        let mut parts: Vec<String> = Vec::new();

        match &query.aggregate {
            Some(aggregate) => parts.push(self.compile_aggregate(query, aggregate)?),
            None => parts.push(self.compile_columns(query, columns)?),
        }

        if let Some(from) = &query.from {
            parts.push(format!("from {}", self.wrap_table(from)?));
        }

        parts.push(self.compile_joins(&query.joins)?);
        parts.push(self.compile_wheres(query)?);

        if !query.groups.is_empty() {
            parts.push(format!("group by {}", self.columnize(&query.groups)?));
        }

        parts.push(self.compile_havings(&query.havings)?);
        parts.push(self.compile_orders(&query.orders)?);

        if let Some(limit) = query.limit {
            parts.push(format!("limit {}", limit));
        }
        if let Some(offset) = query.offset {
            parts.push(format!("offset {}", offset));
        }

        parts.push(self.compile_unions(query)?);

        if let Some(lock) = &query.lock {
            parts.push(lock.clone());
        }

        Ok(concatenate(parts))
    }

    fn compile_aggregate(&self, query: &Query, aggregate: &Aggregate) -> ModelResult<String> {
        let mut column = self.columnize(&aggregate.columns)?;
        if query.distinct && column != "*" {
            column = format!("distinct {}", column);
        }
        Ok(format!("select {}({}) as aggregate", aggregate.function, column))
    }

    fn compile_columns(&self, query: &Query, columns: &[Column]) -> ModelResult<String> {
        let select = if query.distinct { "select distinct " } else { "select " };
        Ok(format!("{}{}", select, self.columnize(columns)?))
    }

    pub(crate) fn compile_joins(&self, joins: &[JoinClause]) -> ModelResult<String> {
        let mut sql = Vec::with_capacity(joins.len());

        for join in joins {
            let table = self.wrap_table(&join.table)?;

            if join.clauses.is_empty() {
                sql.push(format!("{} join {}", join.join_type, table));
                continue;
            }

            let clauses = self.compile_join_constraints(&join.clauses)?;
            sql.push(format!("{} join {} on {}", join.join_type, table, clauses));
        }

        Ok(sql.join(" "))
    }

    fn compile_join_constraints(&self, clauses: &[JoinConstraint]) -> ModelResult<String> {
        let mut sql = Vec::with_capacity(clauses.len());

        for clause in clauses {
            let rendered = match &clause.kind {
                JoinConstraintKind::On { first, operator, second } => {
                    format!("{} {} {}", self.wrap(first)?, operator, self.wrap(second)?)
                }
                JoinConstraintKind::Where { first, operator, value } => {
                    format!("{} {} {}", self.wrap(first)?, operator, self.parameter(value))
                }
                JoinConstraintKind::WhereIn { first, values, not } => {
                    if values.is_empty() {
                        if *not { "1 = 1".to_string() } else { "0 = 1".to_string() }
                    } else {
                        let operator = if *not { "not in" } else { "in" };
                        format!("{} {} ({})", self.wrap(first)?, operator, self.parameterize(values))
                    }
                }
                JoinConstraintKind::Nested(nested) => {
                    format!("({})", self.compile_join_constraints(nested)?)
                }
            };
            sql.push(format!("{} {}", clause.boolean, rendered));
        }

        Ok(remove_leading_boolean(&sql.join(" ")).to_string())
    }

    /// Compile the where clauses, including the `where` keyword
    pub fn compile_wheres(&self, query: &Query) -> ModelResult<String> {
        if query.wheres.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("where {}", self.compile_where_list(&query.wheres)?))
    }

    fn compile_where_list(&self, wheres: &[Where]) -> ModelResult<String> {
        let sql = wheres
            .iter()
            .map(|w| Ok(format!("{} {}", w.boolean, self.compile_where(&w.kind)?)))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(remove_leading_boolean(&sql.join(" ")).to_string())
    }

    fn compile_where(&self, kind: &WhereKind) -> ModelResult<String> {
        let sql = match kind {
            WhereKind::Basic { column, operator, value } => {
                format!("{} {} {}", self.wrap(column)?, operator, self.parameter(value))
            }
            WhereKind::Column { first, operator, second } => {
                format!("{} {} {}", self.wrap(first)?, operator, self.wrap(second)?)
            }
            WhereKind::Between { column, low, high, not } => format!(
                "{} {}between {} and {}",
                self.wrap(column)?,
                if *not { "not " } else { "" },
                self.parameter(low),
                self.parameter(high)
            ),
            WhereKind::In { column, values } => {
                if values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    format!("{} in ({})", self.wrap(column)?, self.parameterize(values))
                }
            }
            WhereKind::NotIn { column, values } => {
                if values.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!("{} not in ({})", self.wrap(column)?, self.parameterize(values))
                }
            }
            WhereKind::InSub { column, query } => {
                format!("{} in ({})", self.wrap(column)?, self.compile_select(query)?)
            }
            WhereKind::NotInSub { column, query } => {
                format!("{} not in ({})", self.wrap(column)?, self.compile_select(query)?)
            }
            WhereKind::Null { column } => format!("{} is null", self.wrap(column)?),
            WhereKind::NotNull { column } => format!("{} is not null", self.wrap(column)?),
            WhereKind::Date { part, column, operator, value } => {
                format!("{}({}) {} {}", part, self.wrap(column)?, operator, self.parameter(value))
            }
            WhereKind::Raw { sql, .. } => sql.clone(),
            WhereKind::Nested { query } => format!("({})", self.compile_where_list(&query.wheres)?),
            WhereKind::Sub { column, operator, query } => {
                format!("{} {} ({})", self.wrap(column)?, operator, self.compile_select(query)?)
            }
            WhereKind::Exists { query } => format!("exists ({})", self.compile_select(query)?),
            WhereKind::NotExists { query } => format!("not exists ({})", self.compile_select(query)?),
        };
        Ok(sql)
    }

    fn compile_havings(&self, havings: &[Having]) -> ModelResult<String> {
        if havings.is_empty() {
            return Ok(String::new());
        }

        let sql = havings
            .iter()
            .map(|having| {
                let rendered = match &having.kind {
                    HavingKind::Basic { column, operator, value } => {
                        format!("{} {} {}", self.wrap(column)?, operator, self.parameter(value))
                    }
                    HavingKind::Raw { sql, .. } => sql.clone(),
                };
                Ok(format!("{} {}", having.boolean, rendered))
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(format!("having {}", remove_leading_boolean(&sql.join(" "))))
    }

    fn compile_orders(&self, orders: &[OrderClause]) -> ModelResult<String> {
        if orders.is_empty() {
            return Ok(String::new());
        }

        let sql = orders
            .iter()
            .map(|order| match order {
                OrderClause::Column { column, direction } => {
                    Ok(format!("{} {}", self.wrap(column)?, direction))
                }
                OrderClause::Raw { sql, .. } => Ok(sql.clone()),
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(format!("order by {}", sql.join(", ")))
    }

    fn compile_unions(&self, query: &Query) -> ModelResult<String> {
        if query.unions.is_empty() {
            return Ok(String::new());
        }

        let mut sql = String::new();
        for union in &query.unions {
            let joiner = if union.all { " union all " } else { " union " };
            sql.push_str(joiner);
            sql.push_str(&self.compile_select(&union.query)?);
        }

        if !query.union_orders.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_orders(&query.union_orders)?);
        }
        if let Some(limit) = query.union_limit {
            sql.push_str(&format!(" limit {}", limit));
        }
        if let Some(offset) = query.union_offset {
            sql.push_str(&format!(" offset {}", offset));
        }

        Ok(sql.trim_start().to_string())
    }
}

fn concatenate(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrmConfig;
    use serde_json::json;

    fn grammar() -> Grammar {
        Grammar::default()
    }

    #[test]
    fn test_remove_leading_boolean() {
        assert_eq!(remove_leading_boolean("and a = ?"), "a = ?");
        assert_eq!(remove_leading_boolean("OR a = ?"), "a = ?");
        assert_eq!(remove_leading_boolean("order = ?"), "order = ?");
        assert_eq!(remove_leading_boolean("android = ?"), "android = ?");
    }

    #[test]
    fn test_simple_select() {
        let sql = grammar().compile_select(&Query::table("users")).unwrap();
        assert_eq!(sql, r#"select * from "users""#);
    }

    #[test]
    fn test_compile_does_not_touch_columns() {
        let query = Query::table("users");
        grammar().compile_select(&query).unwrap();
        assert_eq!(query.columns(), None);
    }

    #[test]
    fn test_distinct_columns() {
        let query = Query::table("users").select(["id", "email"]).distinct();
        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            r#"select distinct "id", "email" from "users""#
        );
    }

    #[test]
    fn test_aggregate_replaces_columns() {
        let query = Query::table("users").select(["id"]).aggregate("count", ["*"]);
        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            r#"select count(*) as aggregate from "users""#
        );

        let query = Query::table("users").distinct().aggregate("count", ["email"]);
        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            r#"select count(distinct "email") as aggregate from "users""#
        );
    }

    #[test]
    fn test_first_connector_is_dropped() {
        let query = Query::table("users").or_where_eq("a", 1).where_eq("b", 2).or_where_null("c");
        let sql = grammar().compile_select(&query).unwrap();
        assert_eq!(sql, r#"select * from "users" where "a" = ? and "b" = ? or "c" is null"#);
        let where_part = sql.split(" where ").nth(1).unwrap();
        assert!(!where_part.starts_with("and ") && !where_part.starts_with("or "));
    }

    #[test]
    fn test_empty_in_lists() {
        let query = Query::table("users").where_in("id", Vec::<i64>::new());
        assert_eq!(grammar().compile_select(&query).unwrap(), r#"select * from "users" where 0 = 1"#);

        let query = Query::table("users").where_not_in("id", Vec::<i64>::new());
        assert_eq!(grammar().compile_select(&query).unwrap(), r#"select * from "users" where 1 = 1"#);
        assert!(query.get_bindings().is_empty());
    }

    #[test]
    fn test_where_variants() {
        let query = Query::table("posts")
            .where_between("votes", 1, 10)
            .where_not_between("score", 0, 5)
            .where_in("id", [1, 2, 3])
            .where_column("updated_at", ">", "created_at")
            .where_year("created_at", "=", 2024)
            .where_raw("lower(title) like ?", vec![json!("%rust%")])
            .where_nested(|q| q.where_eq("a", 1).or_where_eq("b", 2));

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select * from "posts" where "votes" between ? and ? and "score" not between ? and ? "#,
                r#"and "id" in (?, ?, ?) and "updated_at" > "created_at" and year("created_at") = ? "#,
                r#"and lower(title) like ? and ("a" = ? or "b" = ?)"#
            )
        );
        assert_eq!(query.get_bindings().len(), 11);
    }

    #[test]
    fn test_sub_queries() {
        let authors = Query::table("users").select(["id"]).where_eq("active", true);
        let query = Query::table("posts")
            .where_in_sub("author_id", authors.clone())
            .where_exists(Query::table("comments").where_column("comments.post_id", "=", "posts.id"))
            .where_sub("views", ">", Query::table("stats").aggregate("avg", ["views"]));

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select * from "posts" where "author_id" in (select "id" from "users" where "active" = ?) "#,
                r#"and exists (select * from "comments" where "comments"."post_id" = "posts"."id") "#,
                r#"and "views" > (select avg("views") as aggregate from "stats")"#
            )
        );
        assert_eq!(query.get_bindings(), vec![json!(true)]);
    }

    #[test]
    fn test_joins() {
        let query = Query::table("users")
            .join("contacts", "users.id", "=", "contacts.user_id")
            .left_join("orders", "users.id", "=", "orders.user_id")
            .cross_join("regions");

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select * from "users" inner join "contacts" on "users"."id" = "contacts"."user_id" "#,
                r#"left join "orders" on "users"."id" = "orders"."user_id" cross join "regions""#
            )
        );
    }

    #[test]
    fn test_join_where_in_and_nested() {
        let query = Query::table("users").join_with(JoinType::Inner, "contacts", |j| {
            j.on("users.id", "=", "contacts.user_id")
                .where_in("contacts.kind", ["a", "b", "c"])
                .nest(Boolean::Or, |n| n.where_("contacts.vip", "=", true).or_on("a", "=", "b"))
        });

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select * from "users" inner join "contacts" on "users"."id" = "contacts"."user_id" "#,
                r#"and "contacts"."kind" in (?, ?, ?) or ("contacts"."vip" = ? or "a" = "b")"#
            )
        );
        assert_eq!(query.get_bindings(), vec![json!("a"), json!("b"), json!("c"), json!(true)]);
    }

    #[test]
    fn test_groups_havings_orders_limits() {
        let query = Query::table("orders")
            .select([Column::from("customer_id"), Column::from(raw("sum(total) as spent"))])
            .group_by(["customer_id"])
            .having("spent", ">", 100)
            .or_having("spent", "<", 5)
            .order_by_desc("customer_id")
            .order_by_raw("spent asc", vec![])
            .limit(10)
            .offset(20);

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select "customer_id", sum(total) as spent from "orders" group by "customer_id" "#,
                r#"having "spent" > ? or "spent" < ? order by "customer_id" desc, spent asc limit 10 offset 20"#
            )
        );
    }

    #[test]
    fn test_unions() {
        let query = Query::table("posts")
            .where_eq("kind", "a")
            .union(Query::table("pages"))
            .union_all(Query::table("drafts").where_eq("kind", "b"))
            .order_by_desc("id")
            .limit(5);

        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            concat!(
                r#"select * from "posts" where "kind" = ? union select * from "pages" "#,
                r#"union all select * from "drafts" where "kind" = ? order by "id" desc limit 5"#
            )
        );
        assert_eq!(query.get_bindings(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_lock_and_prefix() {
        let grammar = Grammar::new(&OrmConfig::new().with_prefix("wp_"));
        let query = Query::table("posts").where_eq("posts.id", 1).lock_for_update();
        assert_eq!(
            grammar.compile_select(&query).unwrap(),
            r#"select * from "wp_posts" where "wp_posts"."id" = ? for update"#
        );
    }

    #[test]
    fn test_raw_value_is_inlined() {
        let query = Query::table("posts").where_op("published_at", "<", raw("now()"));
        assert_eq!(
            grammar().compile_select(&query).unwrap(),
            r#"select * from "posts" where "published_at" < now()"#
        );
        assert!(query.get_bindings().is_empty());
    }

    #[test]
    fn test_invalid_identifier_fails_compilation() {
        let query = Query::table("posts").where_eq("a.b.c", 1);
        assert!(grammar().compile_select(&query).is_err());
    }
}
