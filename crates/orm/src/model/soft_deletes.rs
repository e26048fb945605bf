//! Soft deletes
//!
//! Entity types flagged with soft deletes get a global scope that hides rows
//! whose deletion column is set, plus a fixed set of builder extensions to
//! bypass or invert it. `delete` on such a query becomes an update of the
//! deletion column; `force_delete` issues the real delete.

use super::entity_type::EntityType;
use crate::query::Query;

/// Query filters applied automatically to an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalScope {
    SoftDeleting,
}

impl GlobalScope {
    /// Narrow the query for the given entity type
    pub fn apply(&self, query: Query, entity_type: &EntityType) -> Query {
        match self {
            GlobalScope::SoftDeleting => query.where_null(&entity_type.qualified_deleted_at_column()),
        }
    }
}

/// Builder extensions registered with the soft-deleting scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeExtension {
    /// Delete rows for real
    ForceDelete,
    /// Clear the deletion column on matching rows, trashed included
    Restore,
    /// Include trashed rows
    WithTrashed,
    /// Exclude trashed rows explicitly
    WithoutTrashed,
    /// Return only trashed rows
    OnlyTrashed,
}

impl ScopeExtension {
    pub const ALL: [ScopeExtension; 5] = [
        ScopeExtension::ForceDelete,
        ScopeExtension::Restore,
        ScopeExtension::WithTrashed,
        ScopeExtension::WithoutTrashed,
        ScopeExtension::OnlyTrashed,
    ];

    /// Extensions that execute a statement rather than reshape the query
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScopeExtension::ForceDelete | ScopeExtension::Restore)
    }
}

impl std::fmt::Display for ScopeExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScopeExtension::ForceDelete => "force_delete",
            ScopeExtension::Restore => "restore",
            ScopeExtension::WithTrashed => "with_trashed",
            ScopeExtension::WithoutTrashed => "without_trashed",
            ScopeExtension::OnlyTrashed => "only_trashed",
        };
        f.write_str(name)
    }
}
