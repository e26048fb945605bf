//! Shared fixtures: a blog schema over a scripted connection

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fluent_orm::testing::FakeConnection;
use fluent_orm::{
    Database, Entity, EntityType, FixedClock, OrmConfig, RelationshipMetadata,
    RelationshipRegistry, Row,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

pub const NOW: &str = "2024-03-09 14:05:00";

pub fn registry() -> RelationshipRegistry {
    let registry = RelationshipRegistry::new();
    registry.register_entity(EntityType::new("User", "users").with_timestamps());
    registry.register_entity(EntityType::new("Post", "posts").with_soft_deletes());
    registry.register_entity(EntityType::new("Comment", "comments"));
    registry.register_entity(EntityType::new("Video", "videos"));
    registry.register_entity(EntityType::new("Country", "countries"));
    registry.register_entity(EntityType::new("Tag", "tags"));
    registry.register_entity(
        EntityType::new("Article", "articles")
            .with_timestamps()
            .with_soft_deletes(),
    );
    registry.morph_map("posts", "Post");

    let relations = [
        ("User", RelationshipMetadata::has_many("posts", "Post", "user_id", "id")),
        ("Post", RelationshipMetadata::belongs_to("author", "User", "user_id", "id")),
        ("Post", RelationshipMetadata::morph_many("comments", "Comment", "commentable", "id")),
        (
            "Post",
            RelationshipMetadata::belongs_to_many("tags", "Tag", "post_tag", "post_id", "tag_id")
                .with_pivot(&["approved"]),
        ),
        ("Comment", RelationshipMetadata::morph_to("commentable")),
        (
            "Country",
            RelationshipMetadata::has_many_through("posts", "Post", "User", "country_id", "user_id", "id"),
        ),
    ];
    for (model, metadata) in relations {
        registry.register(model, metadata).unwrap();
    }
    registry
}

/// Route `tracing` output through the test harness; `RUST_LOG=debug` shows SQL
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn database() -> (Database, Arc<FakeConnection>) {
    init_tracing();
    let conn = Arc::new(FakeConnection::new());
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap());
    let db = Database::new(conn.clone(), OrmConfig::default(), registry())
        .unwrap()
        .with_clock(Arc::new(clock));
    (db, conn)
}

/// A persisted entity of a registered type
pub fn persisted(db: &Database, model: &str, value: Value) -> Entity {
    let row: Row = value.as_object().cloned().unwrap_or_default();
    Entity::from_row(db.registry().entity_type(model).unwrap(), row)
}
