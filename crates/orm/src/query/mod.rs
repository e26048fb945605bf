//! Query Builder Module - structured, fluent description of a SQL statement
//!
//! A [`Query`] is plain data. The grammar turns it into SQL text, and
//! [`Query::get_bindings`] yields the parameters in the same left-to-right
//! order the placeholders appear.

pub mod builder;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod types;
pub mod where_clause;

pub use builder::Query;
pub use joins::JoinClause;
pub use types::*;
