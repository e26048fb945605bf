//! Relationships Module - relation descriptors, loaders and eager loading

pub mod belongs_to;
pub mod belongs_to_many;
pub mod eager_loading;
pub mod has_many_through;
pub mod has_one_or_many;
pub mod metadata;
pub mod morph_to;
pub mod pivot;
pub mod registry;
pub mod traits;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::{pivot_of, BelongsToMany};
pub use eager_loading::{make_relation, nested_relations, parse_with_relations, relation_for};
pub use has_many_through::HasManyThrough;
pub use has_one_or_many::HasOneOrMany;
pub use metadata::{RelationKind, RelationshipMetadata, RelationshipType};
pub use morph_to::{MorphTo, PendingOp};
pub use pivot::Pivot;
pub use registry::RelationshipRegistry;
pub use traits::{relation_count_hash, EagerConstraint, EagerLoad, MorphConstraint, Relation};
