mod common;

use common::{database, persisted};
use fluent_orm::relationships::pivot_of;
use fluent_orm::{Collection, RelationValue};
use serde_json::json;

fn many_len(value: Option<&RelationValue>) -> Option<usize> {
    value.and_then(RelationValue::as_many).map(Collection::len)
}

#[tokio::test]
async fn test_belongs_to_with_only_null_foreign_keys() {
    let (db, conn) = database();
    conn.push_json(json!([
        {"id": 1, "user_id": null},
        {"id": 2, "user_id": null}
    ]));

    let posts = db.query("Post").unwrap().with(&["author"]).get(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[1].sql, r#"select * from "users" where "users"."id" in (?)"#);
    assert_eq!(executed[1].bindings, vec![json!(0)]);

    for post in &posts {
        assert!(post.relation_loaded("author"));
        assert!(post.relation("author").map(RelationValue::is_null).unwrap_or(false));
    }
}

#[tokio::test]
async fn test_has_many_initializes_unmatched_owners() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}, {"id": 2}]));
    conn.push_json(json!([
        {"id": 10, "user_id": 1},
        {"id": 11, "user_id": 1}
    ]));

    let users = db.query("User").unwrap().with(&["posts"]).get(&db).await.unwrap();

    assert_eq!(
        conn.executed()[1].sql,
        r#"select * from "posts" where "posts"."user_id" in (?, ?) and "posts"."deleted_at" is null"#
    );
    assert_eq!(many_len(users[0].relation("posts")), Some(2));
    assert_eq!(many_len(users[1].relation("posts")), Some(0));
}

#[tokio::test]
async fn test_nested_morph_many_is_constrained_by_type() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}]));
    conn.push_json(json!([{"id": 10, "user_id": 1}]));
    conn.push_json(json!([{"id": 100, "commentable_type": "posts", "commentable_id": 10}]));

    let users = db.query("User").unwrap().with(&["posts.comments"]).get(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(executed.len(), 3);
    assert!(executed[2].sql.contains(r#""comments"."commentable_id" in (?)"#));
    assert!(executed[2].sql.contains(r#""comments"."commentable_type" = ?"#));
    assert!(executed[2].bindings.contains(&json!("posts")));

    let posts = users[0].relation("posts").and_then(RelationValue::as_many).unwrap();
    assert_eq!(many_len(posts[0].relation("comments")), Some(1));
}

#[tokio::test]
async fn test_morph_to_issues_one_query_per_type() {
    let (db, conn) = database();
    conn.push_json(json!([
        {"id": 1, "commentable_type": "posts", "commentable_id": 10},
        {"id": 2, "commentable_type": "Video", "commentable_id": "5"},
        {"id": 3, "commentable_type": null, "commentable_id": null}
    ]));
    conn.push_json(json!([{"id": 10}]));
    conn.push_json(json!([{"id": 5}]));

    let comments = db.query("Comment").unwrap().with(&["commentable"]).get(&db).await.unwrap();

    let sql = conn.executed_sql();
    assert_eq!(sql.len(), 3);
    assert_eq!(sql[1], r#"select * from "posts" where "posts"."id" in (?) and "posts"."deleted_at" is null"#);
    assert_eq!(sql[2], r#"select * from "videos" where "videos"."id" in (?)"#);

    let owner = |index: usize| {
        comments[index]
            .relation("commentable")
            .and_then(RelationValue::as_one)
            .map(|model| model.type_name().to_string())
    };
    assert_eq!(owner(0).as_deref(), Some("Post"));
    assert_eq!(owner(1).as_deref(), Some("Video"));
    assert_eq!(owner(2), None);
    assert!(comments[2].relation_loaded("commentable"));
}

#[tokio::test]
async fn test_unknown_morph_type_is_an_error() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1, "commentable_type": "Podcast", "commentable_id": 3}]));

    let result = db.query("Comment").unwrap().with(&["commentable"]).get(&db).await;
    assert!(matches!(result, Err(fluent_orm::ModelError::UnknownMorphType(t)) if t == "Podcast"));
}

#[tokio::test]
async fn test_has_many_through_matches_on_through_key() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}, {"id": 2}]));
    conn.push_json(json!([{"id": 7, "user_id": 3, "country_id": 1}]));

    let countries = db.query("Country").unwrap().with(&["posts"]).get(&db).await.unwrap();

    let sql = &conn.executed_sql()[1];
    assert!(sql.starts_with(r#"select "posts".*, "users"."country_id" from "posts""#));
    assert!(sql.contains(r#"inner join "users" on "users"."id" = "posts"."user_id""#));
    assert!(sql.contains(r#""users"."country_id" in (?, ?)"#));

    assert_eq!(many_len(countries[0].relation("posts")), Some(1));
    assert_eq!(many_len(countries[1].relation("posts")), Some(0));
}

#[tokio::test]
async fn test_belongs_to_many_hydrates_pivot() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}]));
    conn.push_json(json!([
        {"id": 4, "name": "rust", "pivot_post_id": 1, "pivot_tag_id": 4, "pivot_approved": true}
    ]));

    let posts = db.query("Post").unwrap().with(&["tags"]).get(&db).await.unwrap();

    let sql = &conn.executed_sql()[1];
    assert!(sql.contains(r#""post_tag"."approved" as "pivot_approved""#));

    let tags = posts[0].relation("tags").and_then(RelationValue::as_many).unwrap();
    let tag = &tags[0];
    assert!(tag.get_attribute("pivot_post_id").is_none());
    let pivot = pivot_of(tag).unwrap();
    assert_eq!(pivot.get("approved"), json!(true));
    assert_eq!(pivot.get("post_id"), json!(1));
}

#[tokio::test]
async fn test_constrained_eager_load() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}]));

    db.query("User")
        .unwrap()
        .with_constraint("posts", |query| query.where_eq("posts.published", true))
        .get(&db)
        .await
        .unwrap();

    let executed = conn.executed();
    assert!(executed[1].sql.contains(r#""posts"."published" = ?"#));
    assert_eq!(executed[1].bindings, vec![json!(true), json!(1)]);
}

#[tokio::test]
async fn test_collection_load() {
    let (db, conn) = database();
    let mut users = Collection::new(vec![
        persisted(&db, "User", json!({"id": 1})),
        persisted(&db, "User", json!({"id": 2})),
    ]);
    conn.push_json(json!([{"id": 10, "user_id": 2}]));

    users.load(&db, &["posts"]).await.unwrap();

    assert_eq!(conn.executed().len(), 1);
    assert_eq!(many_len(users[0].relation("posts")), Some(0));
    assert_eq!(many_len(users[1].relation("posts")), Some(1));

    let mut empty = Collection::empty();
    empty.load(&db, &["posts"]).await.unwrap();
    assert_eq!(conn.executed().len(), 1);
}

#[tokio::test]
async fn test_lazy_relation_access() {
    let (db, conn) = database();
    let post = persisted(&db, "Post", json!({"id": 3, "user_id": 9}));
    conn.push_json(json!([{"id": 9, "name": "Ann"}]));

    let author = post.related(&db, "author").await.unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        r#"select * from "users" where "users"."id" = ? limit 1"#
    );
    assert_eq!(author.as_one().map(|user| user.get("name")), Some(json!("Ann")));
}

#[tokio::test]
async fn test_belongs_to_many_keeps_pivot_under_a_custom_select() {
    let (db, conn) = database();
    conn.push_json(json!([{"id": 1}]));
    conn.push_json(json!([
        {"id": 4, "name": "rust", "pivot_post_id": 1, "pivot_tag_id": 4, "pivot_approved": false}
    ]));

    let posts = db
        .query("Post")
        .unwrap()
        .with_constraint("tags", |query| query.select(["tags.id", "tags.name"]))
        .get(&db)
        .await
        .unwrap();

    let sql = &conn.executed_sql()[1];
    assert!(sql.starts_with(
        r#"select "tags"."id", "tags"."name", "post_tag"."post_id" as "pivot_post_id", "post_tag"."tag_id" as "pivot_tag_id", "post_tag"."approved" as "pivot_approved" from "tags""#
    ));
    assert_eq!(many_len(posts[0].relation("tags")), Some(1));
}
