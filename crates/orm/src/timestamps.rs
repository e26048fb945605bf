//! Clock and timestamp formatting shared by entities and soft deletes

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;

use crate::config::OrmConfig;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Format an instant using the configured offset and date format
pub fn format_timestamp(instant: DateTime<Utc>, config: &OrmConfig) -> String {
    let offset = FixedOffset::east_opt(config.utc_offset_seconds).unwrap_or_else(|| Utc.fix());
    instant
        .with_timezone(&offset)
        .format(&config.date_format)
        .to_string()
}

/// Current time as a storable column value
pub fn fresh_timestamp(clock: &dyn Clock, config: &OrmConfig) -> Value {
    Value::String(format_timestamp(clock.now(), config))
}
