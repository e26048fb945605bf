//! Eager Loading System - Prevents N+1 query problems with efficient relationship loading
//!
//! Requested names may be nested (`posts.comments.author`). Every prefix is
//! loaded as well, and each top-level relation receives the remainder of its
//! nested names to load on its own results.

use std::sync::Arc;

use tracing::debug;

use super::belongs_to::BelongsTo;
use super::belongs_to_many::BelongsToMany;
use super::has_many_through::HasManyThrough;
use super::has_one_or_many::HasOneOrMany;
use super::metadata::{RelationKind, RelationshipMetadata};
use super::morph_to::MorphTo;
use super::registry::RelationshipRegistry;
use super::traits::{EagerLoad, Relation};
use crate::collection::Dictionary;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{Entity, EntityType, ModelQuery};

/// Merge `loads` into `existing`, adding every nested prefix
///
/// Intermediate names are added unconstrained only if absent; an explicitly
/// requested name replaces any earlier entry in place.
pub fn parse_with_relations(existing: &[EagerLoad], loads: Vec<EagerLoad>) -> Vec<EagerLoad> {
    let mut parsed: Dictionary<String, EagerLoad> = Dictionary::new();
    for load in existing {
        parsed.insert(load.name.clone(), load.clone());
    }

    for load in loads {
        let segments: Vec<&str> = load.name.split('.').collect();
        for depth in 1..segments.len() {
            let prefix = segments[..depth].join(".");
            parsed.insert_if_absent(prefix.clone(), EagerLoad::new(&prefix));
        }
        parsed.insert(load.name.clone(), load);
    }

    parsed.into_values()
}

/// Loads nested below `relation`, with the `relation.` prefix removed
pub fn nested_relations(loads: &[EagerLoad], relation: &str) -> Vec<EagerLoad> {
    let prefix = format!("{}.", relation);
    loads
        .iter()
        .filter_map(|load| {
            load.name.strip_prefix(&prefix).map(|rest| EagerLoad {
                name: rest.to_string(),
                constraint: load.constraint.clone(),
            })
        })
        .collect()
}

/// Instantiate an unconstrained relation from its metadata
pub fn make_relation(
    registry: &RelationshipRegistry,
    parent: &Arc<EntityType>,
    metadata: &RelationshipMetadata,
) -> ModelResult<Box<dyn Relation>> {
    let query_for = |related: &str| -> ModelResult<ModelQuery> {
        Ok(ModelQuery::new(registry.clone(), registry.entity_type(related)?))
    };

    let relation: Box<dyn Relation> = match &metadata.kind {
        RelationKind::HasOne { related, foreign_key, local_key }
        | RelationKind::HasMany { related, foreign_key, local_key } => Box::new(HasOneOrMany::new(
            &metadata.name,
            metadata.relationship_type(),
            query_for(related)?,
            foreign_key,
            local_key,
        )),
        RelationKind::MorphOne { related, morph_type, foreign_key, local_key }
        | RelationKind::MorphMany { related, morph_type, foreign_key, local_key } => Box::new(
            HasOneOrMany::new(
                &metadata.name,
                metadata.relationship_type(),
                query_for(related)?,
                foreign_key,
                local_key,
            )
            .morph(morph_type, &registry.morph_class_for(parent)),
        ),
        RelationKind::BelongsTo { related, foreign_key, other_key } => Box::new(BelongsTo::new(
            &metadata.name,
            query_for(related)?,
            foreign_key,
            other_key,
        )),
        RelationKind::BelongsToMany { related, table, foreign_pivot_key, related_pivot_key, pivot_columns } => {
            Box::new(
                BelongsToMany::new(
                    &metadata.name,
                    query_for(related)?,
                    table,
                    foreign_pivot_key,
                    related_pivot_key,
                    parent.key_name(),
                )
                .with_pivot(pivot_columns),
            )
        }
        RelationKind::MorphToMany { related, morph_name, table, foreign_pivot_key, related_pivot_key, inverse } => {
            let query = query_for(related)?;
            let class = if *inverse {
                registry.morph_class_for(query.entity_type())
            } else {
                registry.morph_class_for(parent)
            };
            Box::new(
                BelongsToMany::new(
                    &metadata.name,
                    query,
                    table,
                    foreign_pivot_key,
                    related_pivot_key,
                    parent.key_name(),
                )
                .morph(&format!("{}_type", morph_name), &class),
            )
        }
        RelationKind::HasManyThrough { related, through, first_key, second_key, local_key } => {
            Box::new(HasManyThrough::new(
                &metadata.name,
                query_for(related)?,
                registry.entity_type(through)?,
                first_key,
                second_key,
                local_key,
            ))
        }
        RelationKind::MorphTo { morph_type, foreign_key, owner_key } => Box::new(MorphTo::new(
            &metadata.name,
            registry.clone(),
            morph_type,
            foreign_key,
            owner_key.as_deref(),
        )),
    };

    Ok(relation)
}

/// Relation `name` of `parent`, constrained to that one entity
pub fn relation_for(registry: &RelationshipRegistry, parent: &Entity, name: &str) -> ModelResult<Box<dyn Relation>> {
    let metadata = registry.get(parent.type_name(), name)?;
    let mut relation = make_relation(registry, parent.entity_type(), &metadata)?;
    relation.add_constraints(parent);
    Ok(relation)
}

/// Eager load every top-level relation in `loads` onto `models`, in order
pub async fn eager_load_relations(
    db: &Database,
    registry: &RelationshipRegistry,
    parent: &Arc<EntityType>,
    loads: &[EagerLoad],
    models: &mut [Entity],
) -> ModelResult<()> {
    if models.is_empty() {
        return Ok(());
    }

    for load in loads.iter().filter(|load| !load.name.contains('.')) {
        let metadata = registry.get(parent.name(), &load.name)?;
        let mut relation = make_relation(registry, parent, &metadata)?;

        if let Some(constraint) = &load.constraint {
            relation.constrain(constraint.clone());
        }
        let nested = nested_relations(loads, &load.name);
        if !nested.is_empty() {
            relation.with(nested);
        }

        debug!(
            model = parent.name(),
            relation = %load.name,
            parents = models.len(),
            "Eager loading relation"
        );

        relation.eager_load(db, models, &load.name).await?;
    }

    Ok(())
}
