mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use keysweep_core::{SecretStore, WalkOptions, WriteErrorAttribution};
use serde_json::json;
use support::TestApp;

fn seeded() -> TestApp {
    let app = TestApp::new();
    app.seed(
        "secret/data/app/db",
        json!({"data": {"USERNAME": "svc", "PASSWORD": "oldpw", "TOKEN": "oldpw"}}),
    );
    app.seed(
        "secret/data/app/cache",
        json!({"data": {"PASSWORD": "oldpw"}}),
    );
    app
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"status": "ok"}));
    assert!(response.correlation_id().is_some());
}

#[tokio::test]
async fn list_mode_is_the_default_and_changes_nothing() {
    let app = seeded();
    let response = app
        .post_raw(
            "/updatePassword",
            json!({"base_path": "secret/app", "old_password": "oldpw"}).to_string(),
            Some("corr-123"),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.correlation_id(), Some("corr-123"));
    assert_eq!(response.body["success"], json!(true));
    assert_eq!(response.body["mode"], json!("list"));
    assert_eq!(
        response.body["updates"],
        json!([
            {"path": "secret/data/app/cache", "key": "PASSWORD"},
            {"path": "secret/data/app/db", "key": "PASSWORD"},
            {"path": "secret/data/app/db", "key": "TOKEN"},
        ])
    );
    assert_eq!(
        response.body["message"],
        json!("found 3 occurrences of the password (list mode, nothing changed)")
    );
    assert_eq!(app.store.writes(), 0);
}

#[tokio::test]
async fn edit_mode_rewrites_matches() {
    let app = seeded();
    let response = app
        .post_json(
            "/updatePassword",
            json!({
                "base_path": "secret/app",
                "old_password": "oldpw",
                "new_password": "newpw",
                "mode": "EDIT"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["mode"], json!("edit"));
    assert_eq!(
        response.body["message"],
        json!("updated 3 occurrences of the password")
    );

    let db = app.store.read("secret/data/app/db").unwrap().unwrap();
    assert_eq!(
        db["data"],
        json!({"USERNAME": "svc", "PASSWORD": "newpw", "TOKEN": "newpw"})
    );
}

#[tokio::test]
async fn no_match_is_still_a_success() {
    let app = seeded();
    let response = app
        .post_json(
            "/updatePassword",
            json!({"base_path": "secret/app", "old_password": "nonexistent-value"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], json!(true));
    assert_eq!(response.body["updates"], json!([]));
    assert_eq!(response.body["message"], json!("no matching password found"));
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let app = seeded();
    let cases = [
        json!({"base_path": "secret/app"}),
        json!({"base_path": "secret/app", "old_password": "oldpw", "mode": "edit"}),
        json!({"old_password": "oldpw", "mode": "rotate"}),
    ];
    for body in cases {
        let response = app.post_json("/updatePassword", body.clone()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response.body["error"], json!("bad_request"));
        assert_eq!(
            response.body["correlation_id"].as_str(),
            response.correlation_id()
        );
    }
    assert_eq!(app.store.writes(), 0);
}

#[tokio::test]
async fn missing_old_password_wins_over_unknown_mode() {
    let app = seeded();
    let response = app
        .post_json(
            "/updatePassword",
            json!({"base_path": "secret/app", "mode": "rotate"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        json!("bad request: old password is required")
    );
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = seeded();
    let response = app
        .post_raw("/updatePassword", "{not json".into(), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], json!("bad_request"));
}

#[tokio::test]
async fn unreachable_store_is_a_server_error() {
    let app = seeded();
    app.store.set_unavailable(Some("connection refused"));
    let response = app
        .post_json(
            "/updatePassword",
            json!({"base_path": "secret/app", "old_password": "oldpw"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["success"], json!(false));
    assert_eq!(response.body["updates"], json!([]));
    assert!(
        response.body["message"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
}

#[tokio::test]
async fn write_failures_are_reported_per_record() {
    let app = TestApp::with_options(WalkOptions {
        attribution: WriteErrorAttribution::LastField,
        ..WalkOptions::default()
    });
    app.seed(
        "secret/data/app/db",
        json!({"data": {"PASSWORD": "oldpw", "TOKEN": "oldpw"}}),
    );
    app.seed(
        "secret/data/app/cache",
        json!({"data": {"PASSWORD": "oldpw"}}),
    );
    app.store.fail_writes_to("secret/data/app/db");

    let response = app
        .post_json(
            "/updatePassword",
            json!({
                "base_path": "secret/app",
                "old_password": "oldpw",
                "new_password": "newpw",
                "mode": "edit"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], json!(true));
    let updates = response.body["updates"].as_array().unwrap();
    assert_eq!(updates.len(), 3);
    assert!(updates[0].get("error").is_none());
    assert!(updates[1].get("error").is_none());
    assert!(updates[2]["error"].as_str().unwrap().contains("permission denied"));
    assert_eq!(
        response.body["message"],
        json!("updated 3 occurrences of the password, 1 failed to write")
    );
}

#[tokio::test]
async fn empty_base_path_searches_the_root() {
    let app = TestApp::new();
    app.seed("secret/data/app/db", json!({"data": {"PASSWORD": "oldpw"}}));
    let response = app
        .post_json("/updatePassword", json!({"old_password": "oldpw"}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    // a bare mount has no metadata listing to walk
    assert_eq!(response.body["updates"], json!([]));
}
