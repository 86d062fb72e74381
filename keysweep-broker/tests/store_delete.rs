mod support;

use axum::http::StatusCode;
use keysweep_core::SecretStore;
use serde_json::json;
use support::TestApp;

#[tokio::test]
async fn send_vault_writes_every_entry_wrapped() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/sendVault",
            json!([
                {"path": "secret/data/app/db", "data": {"PASSWORD": "pw", "PORT": "5432"}},
                {"path": "secret//data/app/cache/", "data": {"TOKEN": "t"}}
            ]),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"written": 2}));
    let db = app.store.read("secret/data/app/db").unwrap().unwrap();
    assert_eq!(db["data"], json!({"PASSWORD": "pw", "PORT": "5432"}));
    let cache = app.store.read("secret/data/app/cache").unwrap().unwrap();
    assert_eq!(cache["data"]["TOKEN"], json!("t"));
}

#[tokio::test]
async fn send_vault_validates_before_writing() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/sendVault",
            json!([
                {"path": "secret/data/app/db", "data": {"PASSWORD": "pw"}},
                {"path": "", "data": {"TOKEN": "t"}}
            ]),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.writes(), 0);

    let response = app
        .post_json("/sendVault", json!([{"path": "secret/data/x", "data": {}}]))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_vault_stops_at_first_failed_write() {
    let app = TestApp::new();
    app.store.fail_writes_to("secret/data/b");
    let response = app
        .post_json(
            "/sendVault",
            json!([
                {"path": "secret/data/a", "data": {"K": "1"}},
                {"path": "secret/data/b", "data": {"K": "2"}},
                {"path": "secret/data/c", "data": {"K": "3"}}
            ]),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], json!("internal"));
    assert_eq!(app.store.writes(), 1);
    assert_eq!(app.store.read("secret/data/c").unwrap(), None);
}

#[tokio::test]
async fn delete_removes_a_leaf_secret() {
    let app = TestApp::new();
    app.seed("secret/data/app/db", json!({"data": {"PASSWORD": "pw"}}));

    let response = app
        .post_json("/deleteSecret", json!({"path": "app/db"}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["message"],
        json!("secret at path 'app/db' deleted successfully")
    );
    assert_eq!(app.store.read("secret/data/app/db").unwrap(), None);
}

#[tokio::test]
async fn delete_refuses_folders_with_secrets() {
    let app = TestApp::new();
    app.seed("secret/data/app/db", json!({"data": {"PASSWORD": "pw"}}));

    let response = app.post_json("/deleteSecret", json!({"path": "app"})).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], json!("forbidden"));
    assert!(app.store.read("secret/data/app/db").unwrap().is_some());
}

#[tokio::test]
async fn delete_requires_a_path() {
    let app = TestApp::new();
    for body in [json!({}), json!({"path": "  "}), json!(["app"])] {
        let response = app.post_json("/deleteSecret", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.body["message"],
            json!("bad request: invalid or missing path")
        );
    }
}

#[tokio::test]
async fn delete_reports_store_outage() {
    let app = TestApp::new();
    app.store.set_unavailable(Some("sealed"));
    let response = app
        .post_json("/deleteSecret", json!({"path": "app/db"}))
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], json!("store_unavailable"));
}
