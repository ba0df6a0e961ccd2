use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn json_stdout(args: &[&str], file: Option<PathBuf>) -> Value {
    let mut cmd = cargo_bin_cmd!("inkmark");
    // Keep the user's config out of the picture
    let temp = tempfile::tempdir().expect("temp dir should be created");
    cmd.arg("--config").arg(temp.path().join("none.json"));
    cmd.args(args);
    if let Some(file) = file {
        cmd.arg(file);
    }
    let output = cmd.env_remove("INKMARK_TOKEN").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn inspect_summarizes_each_page() {
    let value = json_stdout(&["inspect"], Some(fixture("marked.json")));

    assert_eq!(value["page_count"], 3);
    assert_eq!(value["ready"], true);
    assert_eq!(value["pages"][0]["objects"][0]["kind"], "stroke");
    assert_eq!(value["pages"][1]["objects"][0]["text"], "Hello");
    assert_eq!(value["pages"][1]["width"], 800.0);
    assert_eq!(value["notices"].as_array().map(Vec::len), Some(0));
}

#[test]
fn inspect_drops_pages_beyond_document() {
    let value = json_stdout(&["inspect", "--pages", "2"], Some(fixture("marked.json")));
    assert_eq!(value["dropped_pages"], serde_json::json!([3]));
    assert_eq!(value["pages"].as_array().map(Vec::len), Some(2));
}

#[test]
fn inspect_reports_malformed_annotations() {
    let value = json_stdout(&["inspect"], Some(fixture("malformed.json")));
    let notices = value["notices"].as_array().expect("notices array");
    assert_eq!(notices.len(), 1);
    assert!(notices[0].as_str().unwrap_or_default().contains("Malformed annotation data"));
    assert_eq!(value["pages"][0]["objects"].as_array().map(Vec::len), Some(0));
}

#[test]
fn inspect_rejects_absurd_page_numbers() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = temp.path().join("huge.json");
    std::fs::write(&file, r#"{"4000000000":{"objects":[]}}"#).expect("fixture should be written");

    cargo_bin_cmd!("inkmark")
        .arg("inspect")
        .arg(file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at most 10000"));
}

#[test]
fn inspect_fails_for_missing_file() {
    cargo_bin_cmd!("inkmark")
        .arg("inspect")
        .arg(fixture("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn brush_derives_highlighter() {
    let value = json_stdout(
        &["brush", "--tool", "highlighter", "--color", "#FF0000", "--size", "5"],
        None,
    );
    assert_eq!(value["behavior"], "free_draw");
    assert_eq!(value["width"], 15.0);
    assert_eq!(value["color"], "rgba(255,0,0,0.3)");
}

#[test]
fn brush_falls_back_for_bad_highlighter_color() {
    let value = json_stdout(&["brush", "--tool", "highlighter", "--color", "#zz"], None);
    assert_eq!(value["color"], "rgba(255,255,0,0.3)");
}

#[test]
fn brush_for_eraser_has_no_stroke() {
    let value = json_stdout(&["brush", "--tool", "eraser"], None);
    assert_eq!(value["behavior"], "erase");
    assert!(value.get("width").is_none());
}

#[test]
fn mark_without_token_is_refused() {
    cargo_bin_cmd!("inkmark")
        .args(["mark", "--submission", "42"])
        .arg(fixture("marked.json"))
        .env_remove("INKMARK_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn mark_dry_run_prints_request() {
    let value = json_stdout(
        &[
            "mark",
            "--submission",
            "42",
            "--mark-type",
            "exam",
            "--score",
            "91",
            "--token",
            "secret",
            "--api-url",
            "https://lms.example/api",
            "--dry-run",
        ],
        Some(fixture("marked.json")),
    );
    assert_eq!(value["method"], "PUT");
    assert_eq!(value["url"], "https://lms.example/api/exams/submissions/42/mark");
    assert_eq!(value["payload"]["submissionId"], "42");
    assert_eq!(value["payload"]["score"], 91.0);

    let data: Value = serde_json::from_str(value["payload"]["annotationData"].as_str().unwrap())
        .expect("annotation data is a JSON document");
    assert_eq!(data["2"]["objects"][0]["Text"]["content"], "Hello");
    // Hidden objects are made visible on load
    assert_eq!(data["2"]["objects"][0]["Text"]["style"]["visible"], true);
}

#[test]
fn mark_refuses_malformed_annotations() {
    cargo_bin_cmd!("inkmark")
        .args(["mark", "--submission", "42", "--token", "t", "--dry-run"])
        .arg(fixture("malformed.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to submit"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("inkmark")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
