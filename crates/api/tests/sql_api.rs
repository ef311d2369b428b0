//! Direct SQL endpoint.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, Reporter};
use serde_json::json;

#[tokio::test]
async fn runs_against_the_default_target() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("10.0.0.9"));

    let response = post_json(t.app.clone(), "/sql", json!({ "sql": "select 1" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["output"], "------RecordSet(0)------\n1    \n");
    assert_eq!(json["data"]["record_sets"], 1);

    let health = body_json(get(t.app, "/health").await).await;
    assert_eq!(health["connected_targets"], 1);
}

#[tokio::test]
async fn explicit_target_overrides_the_default() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("down.example"));

    let response = post_json(
        t.app,
        "/sql",
        json!({ "sql": "select 1", "target": "10.0.0.9:4001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn targets_without_a_port_use_the_configured_one() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("10.0.0.9"));

    let response = post_json(t.app.clone(), "/sql", json!({ "sql": "select 1" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = post_json(
        t.app,
        "/sql",
        json!({ "sql": "select 1", "target": "10.0.0.10" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(t.connector.targets(), vec!["10.0.0.9:4001", "10.0.0.10:4001"]);
}

#[tokio::test]
async fn no_target_is_a_400() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), None);

    let response = post_json(t.app, "/sql", json!({ "sql": "select 1" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn empty_statement_is_a_400() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("10.0.0.9"));

    let response = post_json(t.app, "/sql", json!({ "sql": "  " })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statement_error_is_a_400_with_the_message() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("10.0.0.9"));

    let response = post_json(t.app, "/sql", json!({ "sql": "oops" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "SQL_ERROR");
    assert!(json["error"].as_str().unwrap().contains("oops"));
}

#[tokio::test]
async fn unreachable_target_is_a_502() {
    let scratch = tempfile::tempdir().unwrap();
    let t = build_test_app(scratch.path(), Reporter::default(), Some("down.example"));

    let response = post_json(t.app, "/sql", json!({ "sql": "select 1" })).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "TARGET_UNAVAILABLE");
}
