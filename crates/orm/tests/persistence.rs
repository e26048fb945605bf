mod common;

use common::{database, persisted, NOW};
use fluent_orm::{Entity, ModelError, ScopeExtension};
use serde_json::json;

#[tokio::test]
async fn test_save_inserts_and_reads_back_the_key() {
    let (db, conn) = database();
    let mut user = Entity::new(db.registry().entity_type("User").unwrap());
    user.set_attribute("name", "Ann").unwrap();
    conn.push_insert_id(5);

    user.save(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(
        executed[0].sql,
        r#"insert into "users" ("created_at", "name", "updated_at") values (?, ?, ?)"#
    );
    assert_eq!(executed[0].bindings, vec![json!(NOW), json!("Ann"), json!(NOW)]);
    assert!(user.exists());
    assert!(!user.is_dirty());
    assert_eq!(user.get("id"), json!(5));
}

#[tokio::test]
async fn test_save_updates_only_dirty_attributes() {
    let (db, conn) = database();
    let mut user = persisted(&db, "User", json!({"id": 5, "name": "Ann", "email": "ann@example.com"}));

    user.save(&db).await.unwrap();
    assert!(conn.executed().is_empty());

    user.set_attribute("name", "Bea").unwrap();
    user.save(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(
        executed[0].sql,
        r#"update "users" set "name" = ?, "updated_at" = ? where "users"."id" = ?"#
    );
    assert_eq!(executed[0].bindings, vec![json!("Bea"), json!(NOW), json!(5)]);
}

#[tokio::test]
async fn test_persisted_keys_are_immutable() {
    let (db, _conn) = database();
    let mut user = persisted(&db, "User", json!({"id": 5}));
    assert!(matches!(
        user.set_attribute("id", 6),
        Err(ModelError::ImmutablePrimaryKey { .. })
    ));
    assert!(user.set_attribute("id", 5).is_ok());
}

#[tokio::test]
async fn test_find_or_fail_reports_the_model() {
    let (db, conn) = database();
    let result = db.query("User").unwrap().find_or_fail(&db, 42).await;

    assert!(matches!(result, Err(ModelError::NotFound { ref model }) if model == "User"));
    assert_eq!(conn.executed_sql()[0], r#"select * from "users" where "users"."id" = ? limit 1"#);
}

#[tokio::test]
async fn test_driver_errors_pass_through() {
    let (db, conn) = database();
    conn.push_error("connection reset");

    let error = db.query("User").unwrap().get(&db).await.unwrap_err();
    assert!(error.is_driver_error());
    assert_eq!(error.to_string(), "connection reset");
}

#[tokio::test]
async fn test_soft_delete_and_restore_entity() {
    let (db, conn) = database();
    let mut post = persisted(&db, "Post", json!({"id": 3, "deleted_at": null}));

    post.delete(&db).await.unwrap();
    assert!(post.trashed());
    assert!(post.exists());
    assert!(!post.is_dirty());

    post.restore(&db).await.unwrap();
    assert!(!post.trashed());

    let executed = conn.executed();
    assert_eq!(executed[0].sql, r#"update "posts" set "deleted_at" = ? where "posts"."id" = ?"#);
    assert_eq!(executed[0].bindings, vec![json!(NOW), json!(3)]);
    assert_eq!(executed[1].sql, r#"update "posts" set "deleted_at" = ? where "posts"."id" = ?"#);
    assert_eq!(executed[1].bindings, vec![json!(null), json!(3)]);
}

#[tokio::test]
async fn test_force_delete_removes_the_row() {
    let (db, conn) = database();
    let mut post = persisted(&db, "Post", json!({"id": 3}));

    post.force_delete(&db).await.unwrap();

    assert!(!post.exists());
    assert_eq!(conn.executed_sql(), vec![r#"delete from "posts" where "posts"."id" = ?"#.to_string()]);
}

#[tokio::test]
async fn test_hard_delete_for_plain_types() {
    let (db, conn) = database();
    let mut comment = persisted(&db, "Comment", json!({"id": 8}));

    comment.delete(&db).await.unwrap();

    assert!(!comment.exists());
    assert_eq!(conn.executed_sql()[0], r#"delete from "comments" where "comments"."id" = ?"#);
}

#[tokio::test]
async fn test_query_delete_is_soft_for_soft_deleting_types() {
    let (db, conn) = database();
    conn.push_affected(2);

    let affected = db.query("Post").unwrap().where_eq("user_id", 4).delete(&db).await.unwrap();

    assert_eq!(affected, 2);
    let executed = conn.executed();
    assert_eq!(
        executed[0].sql,
        r#"update "posts" set "deleted_at" = ? where "user_id" = ? and "posts"."deleted_at" is null"#
    );
    assert_eq!(executed[0].bindings, vec![json!(NOW), json!(4)]);
}

#[tokio::test]
async fn test_query_restore_includes_trashed_rows() {
    let (db, conn) = database();

    db.query("Post")
        .unwrap()
        .only_trashed()
        .unwrap()
        .restore(&db)
        .await
        .unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        r#"update "posts" set "deleted_at" = ? where "posts"."deleted_at" is not null"#
    );
}

#[tokio::test]
async fn test_soft_delete_extensions_need_the_capability() {
    let (db, _conn) = database();

    assert!(matches!(db.query("User").unwrap().with_trashed(), Err(ModelError::Logic(_))));
    assert!(matches!(
        db.query("Post").unwrap().extend(ScopeExtension::Restore),
        Err(ModelError::Logic(_))
    ));
    assert!(db.query("Post").unwrap().extend(ScopeExtension::WithTrashed).is_ok());
    assert!(db.query("User").unwrap().force_delete(&db).await.is_err());
}

#[tokio::test]
async fn test_paginate() {
    let (db, conn) = database();
    conn.push_json(json!([{"aggregate": 23}]));
    conn.push_json(json!([{"id": 21}, {"id": 22}, {"id": 23}]));

    let page = db.query("User").unwrap().paginate(&db, Some(5), Some(5)).await.unwrap();

    let sql = conn.executed_sql();
    assert_eq!(sql[0], r#"select count(*) as aggregate from "users""#);
    assert_eq!(sql[1], r#"select * from "users" limit 5 offset 20"#);
    assert_eq!(page.total(), 23);
    assert_eq!(page.last_page(), 5);
    assert!(!page.has_more_pages());
    assert_eq!((page.first_item(), page.last_item()), (Some(21), Some(23)));
    assert_eq!(page.previous_page_url().as_deref(), Some("/?page=4"));
}

#[tokio::test]
async fn test_paginate_without_rows_skips_the_page_query() {
    let (db, conn) = database();
    conn.push_json(json!([{"aggregate": "0"}]));

    let page = db.query("Post").unwrap().paginate(&db, None, None).await.unwrap();

    assert_eq!(conn.executed().len(), 1);
    assert_eq!(page.per_page(), 15);
    assert_eq!(page.last_page(), 0);
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_has_filters_by_relation_existence() {
    let (db, conn) = database();

    db.query("User").unwrap().has("posts").unwrap().get(&db).await.unwrap();

    assert_eq!(
        conn.executed_sql()[0],
        r#"select * from "users" where exists (select * from "posts" where "posts"."user_id" = "users"."id" and "posts"."deleted_at" is null)"#
    );
}

#[tokio::test]
async fn test_soft_delete_touches_updated_at() {
    let (db, conn) = database();
    let mut article = persisted(
        &db,
        "Article",
        json!({"id": 2, "deleted_at": null, "updated_at": "2024-01-01 00:00:00"}),
    );

    article.delete(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(
        executed[0].sql,
        r#"update "articles" set "deleted_at" = ?, "updated_at" = ? where "articles"."id" = ?"#
    );
    assert_eq!(executed[0].bindings, vec![json!(NOW), json!(NOW), json!(2)]);
    assert_eq!(article.get("updated_at"), json!(NOW));
    assert!(!article.is_dirty());
}

#[tokio::test]
async fn test_query_soft_delete_touches_updated_at() {
    let (db, conn) = database();

    db.query("Article").unwrap().where_eq("id", 2).delete(&db).await.unwrap();

    let executed = conn.executed();
    assert_eq!(
        executed[0].sql,
        r#"update "articles" set "deleted_at" = ?, "updated_at" = ? where "id" = ? and "articles"."deleted_at" is null"#
    );
    assert_eq!(executed[0].bindings, vec![json!(NOW), json!(NOW), json!(2)]);
}

#[tokio::test]
async fn test_query_force_delete_reaches_trashed_rows() {
    let (db, conn) = database();
    conn.push_affected(1);

    let affected = db.query("Post").unwrap().where_eq("id", 5).force_delete(&db).await.unwrap();

    assert_eq!(affected, 1);
    assert_eq!(conn.executed_sql(), vec![r#"delete from "posts" where "id" = ?"#.to_string()]);
}

#[tokio::test]
async fn test_count_and_pluck_drop_raw_select_bindings() {
    let (db, conn) = database();
    conn.push_json(json!([{"aggregate": 1}]));
    conn.push_json(json!([{"email": "ann@example.com"}]));
    let users = db
        .query("User")
        .unwrap()
        .tap(|query| query.select_raw("? as flag", vec![json!("x")]))
        .where_eq("active", true);

    assert_eq!(users.count(&db).await.unwrap(), 1);
    let emails = users.pluck(&db, "email").await.unwrap();

    let executed = conn.executed();
    assert_eq!(executed[0].sql, r#"select count(*) as aggregate from "users" where "active" = ?"#);
    assert_eq!(executed[0].bindings, vec![json!(true)]);
    assert_eq!(executed[1].sql, r#"select "email" from "users" where "active" = ?"#);
    assert_eq!(executed[1].bindings, vec![json!(true)]);
    assert_eq!(emails, vec![json!("ann@example.com")]);
}

#[tokio::test]
async fn test_paginate_far_page_does_not_overflow() {
    let (db, conn) = database();
    conn.push_json(json!([{"aggregate": 3}]));
    conn.push_json(json!([]));

    let page = db
        .query("User")
        .unwrap()
        .paginate(&db, Some(10), Some(i64::MAX))
        .await
        .unwrap();

    assert_eq!(
        conn.executed_sql()[1],
        format!(r#"select * from "users" limit 10 offset {}"#, i64::MAX)
    );
    assert_eq!(page.current_page(), i64::MAX);
    assert!(page.is_empty());
    assert_eq!(page.first_item(), None);
    assert!(page.next_page_url().is_none());
}
