//! Relationship Metadata System - immutable relation descriptors

use crate::error::{ModelError, ModelResult};

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// Many-to-one relationship (belongsTo)
    BelongsTo,
    /// Many-to-many relationship through a pivot table
    BelongsToMany,
    /// One-to-many relationship through an intermediate model
    HasManyThrough,
    /// Polymorphic one-to-one relationship
    MorphOne,
    /// Polymorphic one-to-many relationship
    MorphMany,
    /// Inverse polymorphic relationship
    MorphTo,
    /// Polymorphic many-to-many relationship
    MorphToMany,
}

impl RelationshipType {
    /// Returns true if this relationship type is polymorphic
    pub fn is_polymorphic(self) -> bool {
        matches!(self, Self::MorphOne | Self::MorphMany | Self::MorphTo | Self::MorphToMany)
    }

    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Self::HasMany | Self::BelongsToMany | Self::HasManyThrough | Self::MorphMany | Self::MorphToMany
        )
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany | Self::MorphToMany)
    }
}

/// Kind-specific keys and tables of a relation
///
/// Related and intermediate types are referenced by registered entity type
/// name. Column names are unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    HasOne {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    HasMany {
        related: String,
        foreign_key: String,
        local_key: String,
    },
    BelongsTo {
        related: String,
        foreign_key: String,
        other_key: String,
    },
    BelongsToMany {
        related: String,
        table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        pivot_columns: Vec<String>,
    },
    HasManyThrough {
        related: String,
        through: String,
        first_key: String,
        second_key: String,
        local_key: String,
    },
    MorphOne {
        related: String,
        morph_type: String,
        foreign_key: String,
        local_key: String,
    },
    MorphMany {
        related: String,
        morph_type: String,
        foreign_key: String,
        local_key: String,
    },
    MorphTo {
        morph_type: String,
        foreign_key: String,
        owner_key: Option<String>,
    },
    MorphToMany {
        related: String,
        morph_name: String,
        table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        inverse: bool,
    },
}

/// Relation descriptor, registered once per owning entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipMetadata {
    /// Name of the relationship on the owning model
    pub name: String,
    pub kind: RelationKind,
}

impl RelationshipMetadata {
    pub fn has_one(name: &str, related: &str, foreign_key: &str, local_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::HasOne {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn has_many(name: &str, related: &str, foreign_key: &str, local_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::HasMany {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    /// `foreign_key` lives on the owner, `other_key` on the related table
    pub fn belongs_to(name: &str, related: &str, foreign_key: &str, other_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::BelongsTo {
                related: related.to_string(),
                foreign_key: foreign_key.to_string(),
                other_key: other_key.to_string(),
            },
        )
    }

    pub fn belongs_to_many(
        name: &str,
        related: &str,
        table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
    ) -> Self {
        Self::new(
            name,
            RelationKind::BelongsToMany {
                related: related.to_string(),
                table: table.to_string(),
                foreign_pivot_key: foreign_pivot_key.to_string(),
                related_pivot_key: related_pivot_key.to_string(),
                pivot_columns: Vec::new(),
            },
        )
    }

    /// `first_key` is on the through table, `second_key` on the related one
    pub fn has_many_through(
        name: &str,
        related: &str,
        through: &str,
        first_key: &str,
        second_key: &str,
        local_key: &str,
    ) -> Self {
        Self::new(
            name,
            RelationKind::HasManyThrough {
                related: related.to_string(),
                through: through.to_string(),
                first_key: first_key.to_string(),
                second_key: second_key.to_string(),
                local_key: local_key.to_string(),
            },
        )
    }

    /// Morph columns are `{morph_name}_type` and `{morph_name}_id`
    pub fn morph_one(name: &str, related: &str, morph_name: &str, local_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::MorphOne {
                related: related.to_string(),
                morph_type: format!("{}_type", morph_name),
                foreign_key: format!("{}_id", morph_name),
                local_key: local_key.to_string(),
            },
        )
    }

    pub fn morph_many(name: &str, related: &str, morph_name: &str, local_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::MorphMany {
                related: related.to_string(),
                morph_type: format!("{}_type", morph_name),
                foreign_key: format!("{}_id", morph_name),
                local_key: local_key.to_string(),
            },
        )
    }

    /// Inverse of morph-one/many; the related type is read from each row
    pub fn morph_to(name: &str) -> Self {
        Self::new(
            name,
            RelationKind::MorphTo {
                morph_type: format!("{}_type", name),
                foreign_key: format!("{}_id", name),
                owner_key: None,
            },
        )
    }

    pub fn morph_to_many(name: &str, related: &str, morph_name: &str, table: &str, related_pivot_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::MorphToMany {
                related: related.to_string(),
                morph_name: morph_name.to_string(),
                table: table.to_string(),
                foreign_pivot_key: format!("{}_id", morph_name),
                related_pivot_key: related_pivot_key.to_string(),
                inverse: false,
            },
        )
    }

    /// Inverse side of a morph-to-many; the pivot type column names the related type
    pub fn morphed_by_many(name: &str, related: &str, morph_name: &str, table: &str, foreign_pivot_key: &str) -> Self {
        Self::new(
            name,
            RelationKind::MorphToMany {
                related: related.to_string(),
                morph_name: morph_name.to_string(),
                table: table.to_string(),
                foreign_pivot_key: foreign_pivot_key.to_string(),
                related_pivot_key: format!("{}_id", morph_name),
                inverse: true,
            },
        )
    }

    fn new(name: &str, kind: RelationKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// Extra pivot columns selected with belongs-to-many results
    pub fn with_pivot(mut self, columns: &[&str]) -> Self {
        if let RelationKind::BelongsToMany { pivot_columns, .. } = &mut self.kind {
            pivot_columns.extend(columns.iter().map(|c| c.to_string()));
        }
        self
    }

    /// Related key for morph-to when it is not the target's primary key
    pub fn with_owner_key(mut self, key: &str) -> Self {
        if let RelationKind::MorphTo { owner_key, .. } = &mut self.kind {
            *owner_key = Some(key.to_string());
        }
        self
    }

    pub fn relationship_type(&self) -> RelationshipType {
        match &self.kind {
            RelationKind::HasOne { .. } => RelationshipType::HasOne,
            RelationKind::HasMany { .. } => RelationshipType::HasMany,
            RelationKind::BelongsTo { .. } => RelationshipType::BelongsTo,
            RelationKind::BelongsToMany { .. } => RelationshipType::BelongsToMany,
            RelationKind::HasManyThrough { .. } => RelationshipType::HasManyThrough,
            RelationKind::MorphOne { .. } => RelationshipType::MorphOne,
            RelationKind::MorphMany { .. } => RelationshipType::MorphMany,
            RelationKind::MorphTo { .. } => RelationshipType::MorphTo,
            RelationKind::MorphToMany { .. } => RelationshipType::MorphToMany,
        }
    }

    /// Entity types this relation refers to, besides its owner
    pub fn referenced_types(&self) -> Vec<&str> {
        match &self.kind {
            RelationKind::HasOne { related, .. }
            | RelationKind::HasMany { related, .. }
            | RelationKind::BelongsTo { related, .. }
            | RelationKind::BelongsToMany { related, .. }
            | RelationKind::MorphOne { related, .. }
            | RelationKind::MorphMany { related, .. }
            | RelationKind::MorphToMany { related, .. } => vec![related.as_str()],
            RelationKind::HasManyThrough { related, through, .. } => vec![related.as_str(), through.as_str()],
            RelationKind::MorphTo { .. } => Vec::new(),
        }
    }

    /// Validate the metadata
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() || self.name.contains('.') {
            return Err(ModelError::Relationship(format!(
                "Relationship name '{}' must be non-empty and contain no dots",
                self.name
            )));
        }

        let columns: Vec<&str> = match &self.kind {
            RelationKind::HasOne { foreign_key, local_key, .. }
            | RelationKind::HasMany { foreign_key, local_key, .. } => vec![foreign_key, local_key],
            RelationKind::BelongsTo { foreign_key, other_key, .. } => vec![foreign_key, other_key],
            RelationKind::BelongsToMany { table, foreign_pivot_key, related_pivot_key, .. } => {
                vec![table, foreign_pivot_key, related_pivot_key]
            }
            RelationKind::HasManyThrough { first_key, second_key, local_key, .. } => {
                vec![first_key, second_key, local_key]
            }
            RelationKind::MorphOne { morph_type, foreign_key, local_key, .. }
            | RelationKind::MorphMany { morph_type, foreign_key, local_key, .. } => {
                vec![morph_type, foreign_key, local_key]
            }
            RelationKind::MorphTo { morph_type, foreign_key, .. } => vec![morph_type, foreign_key],
            RelationKind::MorphToMany { table, foreign_pivot_key, related_pivot_key, .. } => {
                vec![table, foreign_pivot_key, related_pivot_key]
            }
        };

        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(ModelError::Relationship(format!(
                "Relationship '{}' of type {:?} has an empty key or table",
                self.name,
                self.relationship_type()
            )));
        }

        if self.referenced_types().iter().any(|t| t.trim().is_empty()) {
            return Err(ModelError::Relationship(format!(
                "Relationship '{}' must name its related model",
                self.name
            )));
        }

        Ok(())
    }
}
