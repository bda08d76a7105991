use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const BLOG: &str = r#"
[statement]
maxDepth = 3

[[model]]
name = "user"
primary_key = "id"
[[model.field]]
name = "id"
[[model.field]]
name = "name"

[[model]]
name = "post"
primary_key = "id"
[[model.field]]
name = "id"
[[model.field]]
name = "title"
[[model.field]]
name = "authorId"
storage = "author_id"
relation = "user.id"

[[model]]
name = "comment"
primary_key = "id"
[[model.field]]
name = "id"
[[model.field]]
name = "text"
[[model.field]]
name = "postId"
relation = "post.id"
"#;

fn write_blog(root: &Path) {
    fs::write(root.join("tangle.toml"), BLOG).expect("write config");
}

fn tangle(root: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tangle");
    cmd.current_dir(root).env("NO_COLOR", "1").env_remove("TANGLE_CONFIG");
    cmd
}

#[test]
fn init_creates_config_once() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();

    tangle(root)
        .arg("init")
        .assert()
        .success()
        .stdout(predicates::str::contains("Created tangle.toml"));
    assert!(root.join("tangle.toml").exists());

    tangle(root)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicates::str::contains("already exists"));
}

#[test]
fn starter_config_passes_check() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();

    tangle(root).arg("init").assert().success();
    tangle(root)
        .arg("check")
        .assert()
        .success()
        .stdout(predicates::str::contains("2 models"));
}

#[test]
fn check_lists_models_and_edges() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .arg("check")
        .assert()
        .success()
        .stdout(
            predicates::str::contains("comment")
                .and(predicates::str::contains("post.authorId -> user.id"))
                .and(predicates::str::contains("3 models, max depth 3")),
        );
}

#[test]
fn path_prints_canonical_form() {
    let dir = tempdir().expect("temp dir");

    tangle(dir.path())
        .args(["path", "$post>$user.name@author"])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("Accessors")
                .and(predicates::str::contains("Canonical: $post>$user.name@author")),
        );
}

#[test]
fn bad_path_fails() {
    let dir = tempdir().expect("temp dir");

    tangle(dir.path())
        .args(["path", ""])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Error"));
}

#[test]
fn route_walks_through_middle_model() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .args(["route", "comment", "user"])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("comment.postId -> post.id")
                .and(predicates::str::contains("2 hops")),
        );
}

#[test]
fn blocked_route_is_unreachable() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .args(["route", "comment", "user", "--block", "post"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("no path from 'comment' to 'user'"));
}

#[test]
fn order_puts_referenced_models_first() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .args(["order", "comment", "user", "post"])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("Write order: user, post, comment")
                .and(predicates::str::contains("Anchor: post")),
        );
}

#[test]
fn plan_prints_statement_json() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .args([
            "plan",
            "--base",
            "post",
            "--field",
            "$post.title",
            "--field",
            "$post>$user.name@author",
            "--limit",
            "5",
        ])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("\"base\": \"post\"")
                .and(predicates::str::contains("\"limit\": 5")),
        );
}

#[test]
fn plan_rejects_unknown_method() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    write_blog(root);

    tangle(root)
        .args(["plan", "--base", "post", "--method", "upsert"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid method"));
}

#[test]
fn missing_config_fails() {
    let dir = tempdir().expect("temp dir");

    tangle(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicates::str::contains("config not found"));
}

#[test]
fn explicit_config_path_is_used() {
    let dir = tempdir().expect("temp dir");
    let root = dir.path();
    let cfg_path = root.join("models.toml");
    fs::write(&cfg_path, BLOG).expect("write config");

    tangle(root)
        .args(["--config", &cfg_path.to_string_lossy(), "check"])
        .assert()
        .success();
}
