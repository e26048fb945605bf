//! Entity type descriptors
//!
//! An [`EntityType`] carries everything the ORM needs to know about a table:
//! key column, timestamp columns, soft-delete capability and the morph class
//! written into polymorphic type columns. Descriptors are built once and
//! shared behind `Arc`.

use super::soft_deletes::{GlobalScope, ScopeExtension};

/// Table metadata for one kind of entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: String,
    table: String,
    key_name: String,
    incrementing: bool,
    timestamps: bool,
    soft_deletes: bool,
    created_at_column: String,
    updated_at_column: String,
    deleted_at_column: String,
    morph_class: Option<String>,
    per_page: Option<u32>,
    hidden: Vec<String>,
    visible: Vec<String>,
}

impl EntityType {
    /// Describe an entity stored in `table`, keyed by an incrementing `id`
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            key_name: "id".to_string(),
            incrementing: true,
            timestamps: false,
            soft_deletes: false,
            created_at_column: "created_at".to_string(),
            updated_at_column: "updated_at".to_string(),
            deleted_at_column: "deleted_at".to_string(),
            morph_class: None,
            per_page: None,
            hidden: Vec::new(),
            visible: Vec::new(),
        }
    }

    /// Descriptor for an intermediate table row
    pub fn pivot(table: &str) -> Self {
        Self::new("Pivot", table).non_incrementing()
    }

    /// Same entity addressed through a table alias
    pub fn aliased(&self, alias: &str) -> Self {
        Self {
            table: alias.to_string(),
            ..self.clone()
        }
    }

    pub fn with_key(mut self, key_name: &str) -> Self {
        self.key_name = key_name.to_string();
        self
    }

    pub fn non_incrementing(mut self) -> Self {
        self.incrementing = false;
        self
    }

    /// Maintain `created_at` / `updated_at` on save and update
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn with_timestamp_columns(mut self, created_at: &str, updated_at: &str) -> Self {
        self.timestamps = true;
        self.created_at_column = created_at.to_string();
        self.updated_at_column = updated_at.to_string();
        self
    }

    /// Register the soft-deleting scope and its extensions
    pub fn with_soft_deletes(mut self) -> Self {
        self.soft_deletes = true;
        self
    }

    pub fn with_deleted_at_column(mut self, column: &str) -> Self {
        self.soft_deletes = true;
        self.deleted_at_column = column.to_string();
        self
    }

    /// Value stored in polymorphic type columns; defaults to the name
    pub fn with_morph_class(mut self, morph_class: &str) -> Self {
        self.morph_class = Some(morph_class.to_string());
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_hidden(mut self, attributes: &[&str]) -> Self {
        self.hidden = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_visible(mut self, attributes: &[&str]) -> Self {
        self.visible = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn incrementing(&self) -> bool {
        self.incrementing
    }

    pub fn uses_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn created_at_column(&self) -> &str {
        &self.created_at_column
    }

    pub fn updated_at_column(&self) -> &str {
        &self.updated_at_column
    }

    pub fn deleted_at_column(&self) -> &str {
        &self.deleted_at_column
    }

    pub fn morph_class(&self) -> &str {
        self.morph_class.as_deref().unwrap_or(&self.name)
    }

    pub fn per_page(&self) -> Option<u32> {
        self.per_page
    }

    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    /// Prefix a bare column with this table's name
    pub fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table, column)
        }
    }

    pub fn qualified_key_name(&self) -> String {
        self.qualify_column(&self.key_name)
    }

    pub fn qualified_deleted_at_column(&self) -> String {
        self.qualify_column(&self.deleted_at_column)
    }

    /// Global scopes applied to every query for this type
    pub fn global_scopes(&self) -> Vec<GlobalScope> {
        if self.soft_deletes {
            vec![GlobalScope::SoftDeleting]
        } else {
            Vec::new()
        }
    }

    /// Builder extensions registered alongside the global scopes
    pub fn extensions(&self) -> &'static [ScopeExtension] {
        if self.soft_deletes {
            &ScopeExtension::ALL
        } else {
            &[]
        }
    }

    pub fn supports_extension(&self, extension: ScopeExtension) -> bool {
        self.extensions().contains(&extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let post = EntityType::new("Post", "posts");
        assert_eq!(post.key_name(), "id");
        assert!(post.incrementing());
        assert_eq!(post.morph_class(), "Post");
        assert_eq!(post.qualified_key_name(), "posts.id");
        assert!(post.global_scopes().is_empty());
        assert!(!post.supports_extension(ScopeExtension::WithTrashed));
    }

    #[test]
    fn test_soft_delete_capability_registers_extensions() {
        let post = EntityType::new("Post", "posts").with_deleted_at_column("removed_on");
        assert_eq!(post.global_scopes(), vec![GlobalScope::SoftDeleting]);
        assert_eq!(post.extensions().len(), 5);
        assert_eq!(post.qualified_deleted_at_column(), "posts.removed_on");
    }

    #[test]
    fn test_qualify_column_keeps_qualified_names() {
        let post = EntityType::new("Post", "posts");
        assert_eq!(post.qualify_column("users.id"), "users.id");
    }
}
