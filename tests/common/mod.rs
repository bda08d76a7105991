//! Blog schema shared by the integration tests.
//!
//! ```text
//! user <- post.authorId
//! post <- comment.postId
//! user <- comment.authorId
//! comment <- comment.replyTo
//! ```

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tangle::normalize::memory::MemoryService;
use tangle::prelude::*;

pub fn blog() -> ModelRegistry {
    ModelRegistry::builder()
        .model(
            Model::new("user")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("name").required())
                .field(Field::new("email"))
                .unique(["email"]),
        )
        .model(
            Model::new("post")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("title").rank(ChangeRank::Major))
                .field(Field::new("body"))
                .field(Field::new("views").rank(ChangeRank::None))
                .field(Field::new("authorId").storage("author_id").relation("user", "id")),
        )
        .model(
            Model::new("comment")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("text"))
                .field(Field::new("postId").storage("post_id").relation("post", "id"))
                .field(Field::new("authorId").storage("author_id").relation("user", "id"))
                .field(Field::new("replyTo").storage("reply_to").relation("comment", "id")),
        )
        .build()
        .expect("blog registry")
}

pub struct Stores {
    pub users: Arc<MemoryService>,
    pub posts: Arc<MemoryService>,
    pub comments: Arc<MemoryService>,
}

impl Stores {
    pub fn empty() -> Self {
        Self {
            users: Arc::new(MemoryService::new("id").unique(["email"])),
            posts: Arc::new(MemoryService::new("id")),
            comments: Arc::new(MemoryService::new("id")),
        }
    }

    pub fn services(&self) -> Services {
        Services::new()
            .with("user", self.users.clone())
            .with("post", self.posts.clone())
            .with("comment", self.comments.clone())
    }
}

pub fn record(value: serde_json::Value) -> Record {
    match Value::from(value) {
        Value::Map(map) => map,
        other => panic!("not a record: {other}"),
    }
}

/// Connector that answers every statement with the same rows and keeps the
/// statements it saw.
#[derive(Default)]
pub struct RecordingConnector {
    rows: Vec<Row>,
    seen: Mutex<Vec<Statement>>,
}

impl RecordingConnector {
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows,
            seen: Mutex::default(),
        }
    }

    pub fn seen(&self) -> Vec<Statement> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn execute(&self, statement: &Statement) -> tangle::Result<Vec<Row>> {
        self.seen.lock().unwrap().push(statement.clone());
        Ok(self.rows.clone())
    }
}
