mod common;

use std::sync::{Arc, Mutex};

use common::{Stores, blog, record};
use serde_json::json;
use tangle::prelude::*;

fn post_shape() -> Shape {
    Shape::new()
        .field("id", "$post.id")
        .field("title", "$post.title")
        .field("views", "$post.views")
        .nested(
            "author",
            Shape::new()
                .field("name", "$user.name")
                .field("email", "$user.email"),
        )
        .nested("comments", Shape::new().field("text", "$comment.text"))
}

fn tangle(stores: &Stores) -> Tangle {
    Tangle::builder(blog()).services(stores.services()).build()
}

#[tokio::test]
async fn nested_post_writes_in_dependency_order() {
    let stores = Stores::empty();
    let document = Value::from(json!({
        "title": "Hello",
        "author": {"name": "ann", "email": "ann@example.com"},
        "comments": [{"text": "first"}, {"text": "second"}]
    }));

    let log = tangle(&stores).push(&post_shape(), &document).await.unwrap();

    let calls: Vec<(&str, Method)> = log.iter().map(|w| (w.model.as_str(), w.method)).collect();
    assert_eq!(
        calls,
        [
            ("user", Method::Create),
            ("post", Method::Create),
            ("comment", Method::Create),
            ("comment", Method::Create),
        ]
    );

    let user = &stores.users.rows()[0];
    let post = &stores.posts.rows()[0];
    assert_eq!(post.get("author_id"), user.get("id"));
    for comment in stores.comments.rows() {
        assert_eq!(comment.get("post_id"), post.get("id"));
    }
}

#[tokio::test]
async fn existing_author_found_by_unique_email() {
    let stores = Stores {
        users: Arc::new(
            tangle::normalize::memory::MemoryService::new("id")
                .unique(["email"])
                .seed(record(json!({"id": 7, "name": "ann", "email": "ann@example.com"}))),
        ),
        ..Stores::empty()
    };
    let document = Value::from(json!({
        "title": "Hello",
        "author": {"name": "ann", "email": "ann@example.com"}
    }));

    let log = tangle(&stores).push(&post_shape(), &document).await.unwrap();

    let calls: Vec<(&str, Method)> = log.iter().map(|w| (w.model.as_str(), w.method)).collect();
    assert_eq!(calls, [("user", Method::Read), ("post", Method::Create)]);
    assert_eq!(stores.posts.rows()[0].get("author_id"), Some(&Value::from(7)));
    assert_eq!(stores.users.rows().len(), 1);
}

#[tokio::test]
async fn change_hook_sees_one_rank_per_document() {
    let stores = Stores {
        posts: Arc::new(
            tangle::normalize::memory::MemoryService::new("id")
                .seed(record(json!({"id": 3, "title": "T", "views": 1}))),
        ),
        ..Stores::empty()
    };
    let ranks = Arc::new(Mutex::new(Vec::new()));
    let sink = ranks.clone();
    let tangle = Tangle::builder(blog())
        .services(stores.services())
        .config(NormalizeConfig::new().on_change(move |rank| sink.lock().unwrap().push(rank)))
        .build();

    let views_only = Value::from(json!({"id": 3, "title": "T", "views": 2}));
    tangle.push(&post_shape(), &views_only).await.unwrap();

    let retitled = Value::from(json!({
        "id": 3,
        "title": "New",
        "comments": [{"text": "a"}]
    }));
    tangle.push(&post_shape(), &retitled).await.unwrap();

    assert_eq!(*ranks.lock().unwrap(), [ChangeRank::None, ChangeRank::Major]);
    assert_eq!(stores.posts.rows()[0].get("title"), Some(&Value::from("New")));
}

#[tokio::test]
async fn replies_point_at_their_comment() {
    let stores = Stores::empty();
    let shape = Shape::new()
        .field("text", "$comment.text")
        .nested("replies", Shape::new().field("text", "$comment.text"));
    let document = Value::from(json!({"text": "root", "replies": [{"text": "r1"}, {"text": "r2"}]}));

    let log = tangle(&stores).push(&shape, &document).await.unwrap();

    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|w| !w.follow_up));
    let rows = stores.comments.rows();
    assert_eq!(rows[1].get("reply_to"), rows[0].get("id"));
    assert_eq!(rows[2].get("reply_to"), rows[0].get("id"));
}

#[tokio::test]
async fn wire_round_trip_writes_the_same() {
    let document = Value::from(json!({
        "title": "Hello",
        "author": {"name": "ann", "email": "ann@example.com"},
        "comments": [{"text": "first"}]
    }));

    let direct = Stores::empty();
    tangle(&direct).push(&post_shape(), &document).await.unwrap();

    let relayed = Stores::empty();
    let engine = tangle(&relayed);
    let wire = engine.flatten(&post_shape(), &document).await.unwrap().to_wire().unwrap();
    assert_eq!(
        wire["comment"][0]["postId"],
        json!({"$ref": {"$placeholder": "post@/"}, "$field": "id"})
    );
    engine.write(Batch::from_wire(&wire).unwrap()).await.unwrap();

    assert_eq!(direct.users.rows(), relayed.users.rows());
    assert_eq!(direct.posts.rows(), relayed.posts.rows());
    assert_eq!(direct.comments.rows(), relayed.comments.rows());
}

#[tokio::test]
async fn read_action_requires_a_record() {
    let stores = Stores::empty();
    let shape = Shape::new()
        .action(Action::Read)
        .field("email", "$user.email");
    let err = tangle(&stores)
        .push(&shape, &Value::from(json!({"email": "nobody@example.com"})))
        .await
        .unwrap_err();
    assert!(matches!(err, TangleError::NotFound(_)), "{err}");
    assert!(stores.users.calls().is_empty());
}

#[tokio::test]
async fn missing_required_field_aborts_before_writes() {
    let stores = Stores::empty();
    let document = Value::from(json!({
        "title": "Hello",
        "author": {"email": "ann@example.com"}
    }));
    let err = tangle(&stores).push(&post_shape(), &document).await.unwrap_err();
    assert!(matches!(err, TangleError::Validation(_)), "{err}");
    assert!(stores.users.calls().is_empty());
    assert!(stores.posts.calls().is_empty());
}
