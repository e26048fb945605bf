//! Core Model Trait - typed views over dynamic entities
//!
//! Queries work on [`Entity`] values. A struct implementing [`Model`] names
//! the registered entity type it mirrors and converts to and from entities
//! through serde.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::entity::Entity;
use crate::backends::Row;
use crate::database::Database;
use crate::error::ModelResult;

pub trait Model: Serialize + DeserializeOwned + Send + Sync + Debug {
    /// Name of the registered entity type
    fn entity_name() -> &'static str;

    fn from_entity(entity: &Entity) -> ModelResult<Self> {
        entity.hydrate()
    }

    /// Attributes as a row; the struct must serialize to a JSON object
    fn to_row(&self) -> ModelResult<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "{} serialized to {} instead of an object",
                Self::entity_name(),
                other
            ))
            .into()),
        }
    }

    /// New, unsaved entity carrying this model's attributes
    fn to_entity(&self, db: &Database) -> ModelResult<Entity> {
        let entity_type = db.registry().entity_type(Self::entity_name())?;
        Ok(Entity::with_attributes(entity_type, self.to_row()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Post {
        id: i64,
        title: String,
    }

    impl Model for Post {
        fn entity_name() -> &'static str {
            "Post"
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Scalar(i64);

    impl Model for Scalar {
        fn entity_name() -> &'static str {
            "Scalar"
        }
    }

    #[test]
    fn test_round_trip_through_entity_rows() {
        let post = Post { id: 2, title: "Hello".into() };
        let row = post.to_row().unwrap();
        let entity = Entity::from_row(Arc::new(EntityType::new("Post", "posts")), row);
        assert_eq!(Post::from_entity(&entity).unwrap(), post);
    }

    #[test]
    fn test_non_object_models_are_rejected() {
        assert!(matches!(
            Scalar(1).to_row(),
            Err(crate::error::ModelError::Serialization(_))
        ));
    }
}
