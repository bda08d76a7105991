use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use tangle::prelude::*;

// ============================================================================
// Schema
// ============================================================================

fn blog() -> ModelRegistry {
    ModelRegistry::builder()
        .model(
            Model::new("user")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("name")),
        )
        .model(
            Model::new("post")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("title"))
                .field(Field::new("authorId").storage("author_id").relation("user", "id")),
        )
        .model(
            Model::new("comment")
                .primary_key("id")
                .field(Field::new("id"))
                .field(Field::new("text"))
                .field(Field::new("postId").storage("post_id").relation("post", "id"))
                .field(Field::new("authorId").storage("author_id").relation("user", "id")),
        )
        .build()
        .expect("blog registry")
}

const PATHS: &[&str] = &[
    "$post.title",
    "$comment>$post>$author:user.name@author",
    "$post>.id#comment@comments",
    "=concat($post.title, $post>$user.name)@label",
];

// ============================================================================
// Benchmarks
// ============================================================================

fn compile_paths(c: &mut Criterion) {
    c.bench_function("compile", |b| {
        b.iter(|| {
            for path in PATHS {
                black_box(compile(black_box(path)).expect("path compiles"));
            }
        })
    });
}

fn build_statement(c: &mut Criterion) {
    let registry = blog();
    c.bench_function("statement_build", |b| {
        b.iter(|| {
            StatementBuilder::new(&registry, "comment")
                .field("$comment.text")
                .field("$comment>$post.title")
                .field("$comment>$post>$user.name@author")
                .filter("$user.name = 'ann' & $comment.text ~ :pattern")
                .sort("-$post.title")
                .limit(20)
                .build()
                .expect("statement builds")
        })
    });
}

criterion_group!(benches, compile_paths, build_statement);
criterion_main!(benches);
