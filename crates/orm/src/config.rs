//! ORM configuration
//!
//! Table prefixes, the multisite global-table allow-list, the SQL dialect and
//! timestamp formatting. Loaded from `ORM_*` environment variables or built
//! directly.

use std::env;

use crate::backends::SqlDialect;
use crate::error::{ModelError, ModelResult};

const SECONDS_PER_DAY: i32 = 86_400;

/// Configuration consumed by the grammar and entity timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct OrmConfig {
    /// Prefix applied to every non-global table
    pub table_prefix: String,
    /// Prefix applied to global tables in multisite mode
    pub base_prefix: String,
    /// Whether global tables use the base prefix
    pub multisite: bool,
    /// Tables shared across all sites
    pub global_tables: Vec<String>,
    pub dialect: SqlDialect,
    /// `chrono` format string for timestamp columns
    pub date_format: String,
    /// Offset applied to the clock before formatting
    pub utc_offset_seconds: i32,
    /// Default page size
    pub per_page: u32,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OrmConfig {
    pub fn new() -> Self {
        Self {
            table_prefix: String::new(),
            base_prefix: String::new(),
            multisite: false,
            global_tables: vec!["users".to_string(), "usermeta".to_string()],
            dialect: SqlDialect::default(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            utc_offset_seconds: 0,
            per_page: 15,
        }
    }

    /// Set the per-site table prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Enable multisite mode with the given base prefix
    pub fn with_multisite(mut self, base_prefix: impl Into<String>) -> Self {
        self.multisite = true;
        self.base_prefix = base_prefix.into();
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(prefix) = lookup("ORM_TABLE_PREFIX") {
            config.table_prefix = prefix;
        }

        if let Some(prefix) = lookup("ORM_BASE_PREFIX") {
            config.base_prefix = prefix;
        }

        if let Some(flag) = lookup("ORM_MULTISITE") {
            config.multisite = match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ModelError::invalid_config(
                        "multisite",
                        flag,
                        "a boolean (true/false)",
                    ))
                }
            };
        }

        if let Some(tables) = lookup("ORM_GLOBAL_TABLES") {
            config.global_tables = tables
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(dialect) = lookup("ORM_DIALECT") {
            config.dialect = dialect.parse().map_err(|_| {
                ModelError::invalid_config("dialect", dialect.clone(), "postgres, mysql, or sqlite")
            })?;
        }

        if let Some(format) = lookup("ORM_DATE_FORMAT") {
            config.date_format = format;
        }

        if let Some(offset) = lookup("ORM_UTC_OFFSET") {
            config.utc_offset_seconds = offset.trim().parse().map_err(|_| {
                ModelError::invalid_config("utc_offset_seconds", offset.clone(), "an integer number of seconds")
            })?;
        }

        if let Some(per_page) = lookup("ORM_PER_PAGE") {
            config.per_page = per_page.trim().parse().map_err(|_| {
                ModelError::invalid_config("per_page", per_page.clone(), "a positive integer")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        for (field, prefix) in [("table_prefix", &self.table_prefix), ("base_prefix", &self.base_prefix)] {
            if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ModelError::invalid_config(
                    field,
                    prefix.clone(),
                    "ASCII letters, digits and underscores",
                ));
            }
        }

        if self.per_page == 0 {
            return Err(ModelError::invalid_config("per_page", "0", "a positive integer"));
        }

        if self.date_format.trim().is_empty() {
            return Err(ModelError::invalid_config("date_format", "", "a non-empty chrono format"));
        }

        if self.utc_offset_seconds.abs() >= SECONDS_PER_DAY {
            return Err(ModelError::invalid_config(
                "utc_offset_seconds",
                self.utc_offset_seconds.to_string(),
                "an offset within 24 hours",
            ));
        }

        Ok(())
    }

    /// Whether a table is shared across sites
    pub fn is_global_table(&self, table: &str) -> bool {
        self.global_tables.iter().any(|t| t == table)
    }

    /// Prefix to apply to the given table
    pub fn prefix_for(&self, table: &str) -> &str {
        if self.multisite && self.is_global_table(table) {
            &self.base_prefix
        } else {
            &self.table_prefix
        }
    }
}
