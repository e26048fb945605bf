//! SQL grammar: identifier wrapping and statement compilation
//!
//! Compilation is pure. It reads a [`crate::query::Query`] and produces SQL
//! text whose `?` placeholders line up with `Query::get_bindings`.

pub mod compiler;
pub mod dml;
pub mod wrapper;

use crate::config::OrmConfig;

pub use dml::{insert_bindings, record_from_row, update_bindings, Record};

/// Dialect-aware SQL compiler
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
    table_prefix: String,
    base_prefix: String,
    multisite: bool,
    global_tables: Vec<String>,
    quote: char,
    random_function: &'static str,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new(&OrmConfig::default())
    }
}

impl Grammar {
    pub fn new(config: &OrmConfig) -> Self {
        Self {
            table_prefix: config.table_prefix.clone(),
            base_prefix: config.base_prefix.clone(),
            multisite: config.multisite,
            global_tables: config.global_tables.clone(),
            quote: config.dialect.identifier_quote(),
            random_function: config.dialect.random_function(),
        }
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// Prefix applied to the given table name
    pub fn prefix_for(&self, table: &str) -> &str {
        if self.multisite && self.global_tables.iter().any(|t| t == table) {
            &self.base_prefix
        } else {
            &self.table_prefix
        }
    }

    /// Expression used by `in_random_order`
    pub fn random_function(&self) -> &'static str {
        self.random_function
    }
}
