//! INSERT / UPDATE / DELETE / TRUNCATE / EXISTS and savepoint compilation

use std::collections::BTreeMap;

use serde_json::Value;

use super::Grammar;
use crate::backends::Row;
use crate::error::{ModelError, ModelResult};
use crate::query::{Query, QueryValue};

/// Column-to-value mapping for inserts and updates, kept in column order
pub type Record = BTreeMap<String, QueryValue>;

impl Grammar {
    fn statement_table(&self, query: &Query, statement: &str) -> ModelResult<String> {
        match &query.from {
            Some(table) => self.wrap_table(table),
            None => Err(ModelError::Query(format!("{} requires a table", statement))),
        }
    }

    /// Compile an insert of one or more records
    ///
    /// Columns are taken from the first record; missing values in later
    /// records bind as null.
    pub fn compile_insert(&self, query: &Query, records: &[Record]) -> ModelResult<String> {
        let table = self.statement_table(query, "insert")?;
        let first = records
            .first()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ModelError::Query("insert requires at least one value".to_string()))?;

        let columns = first
            .keys()
            .map(|c| self.wrap(c))
            .collect::<ModelResult<Vec<_>>>()?
            .join(", ");

        let null = QueryValue::Bound(Value::Null);
        let rows = records
            .iter()
            .map(|record| {
                let values: Vec<&QueryValue> = first.keys().map(|c| record.get(c).unwrap_or(&null)).collect();
                let placeholders = values.iter().map(|v| self.parameter(v)).collect::<Vec<_>>();
                format!("({})", placeholders.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("insert into {} ({}) values {}", table, columns, rows))
    }

    /// Compile an update, including any joins on the query
    pub fn compile_update(&self, query: &Query, values: &Record) -> ModelResult<String> {
        let table = self.statement_table(query, "update")?;
        if values.is_empty() {
            return Err(ModelError::Query("update requires at least one value".to_string()));
        }

        let columns = values
            .iter()
            .map(|(column, value)| Ok(format!("{} = {}", self.wrap(column)?, self.parameter(value))))
            .collect::<ModelResult<Vec<_>>>()?
            .join(", ");

        let joins = if query.joins.is_empty() {
            String::new()
        } else {
            format!(" {}", self.compile_joins(&query.joins)?)
        };

        let wheres = self.compile_wheres(query)?;

        Ok(format!("update {}{} set {} {}", table, joins, columns, wheres)
            .trim()
            .to_string())
    }

    /// Compile a delete
    pub fn compile_delete(&self, query: &Query) -> ModelResult<String> {
        let table = self.statement_table(query, "delete")?;
        let wheres = self.compile_wheres(query)?;
        Ok(format!("delete from {} {}", table, wheres).trim().to_string())
    }

    /// Compile a truncate
    pub fn compile_truncate(&self, query: &Query) -> ModelResult<String> {
        Ok(format!("truncate {}", self.statement_table(query, "truncate")?))
    }

    /// Wrap a select in an existence check
    pub fn compile_exists(&self, query: &Query) -> ModelResult<String> {
        Ok(format!(
            "select exists({}) as {}",
            self.compile_select(query)?,
            self.wrap_value("exists")
        ))
    }

    pub fn supports_savepoints(&self) -> bool {
        true
    }

    pub fn compile_savepoint(&self, name: &str) -> ModelResult<String> {
        Ok(format!("SAVEPOINT {}", savepoint_name(name)?))
    }

    pub fn compile_savepoint_rollback(&self, name: &str) -> ModelResult<String> {
        Ok(format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(name)?))
    }
}

fn savepoint_name(name: &str) -> ModelResult<&str> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(ModelError::InvalidIdentifier(name.to_string()))
    }
}

/// Record binding every attribute of a row
pub fn record_from_row(row: &Row) -> Record {
    row.iter()
        .map(|(column, value)| (column.clone(), QueryValue::from(value.clone())))
        .collect()
}

/// Bindings for [`Grammar::compile_insert`]
pub fn insert_bindings(records: &[Record]) -> Vec<Value> {
    let Some(first) = records.first() else {
        return Vec::new();
    };

    records
        .iter()
        .flat_map(|record| {
            first.keys().filter_map(move |column| match record.get(column) {
                Some(value) => value.binding().cloned(),
                None => Some(Value::Null),
            })
        })
        .collect()
}

/// Bindings for [`Grammar::compile_update`]: joins, then values, then wheres
pub fn update_bindings(query: &Query, values: &Record) -> Vec<Value> {
    let mut bindings = query.join_bindings();
    bindings.extend(values.values().filter_map(|v| v.binding().cloned()));
    bindings.extend(query.where_bindings());
    bindings
}
