use crate::helpers::{spawn_app, spawn_app_with};
use reqwest::Method;
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{header, path};
use wiremock::{Mock, ResponseTemplate};

async fn spawn_protected_app() -> crate::helpers::TestApp {
    spawn_app_with(|c| {
        c.application.admin_password = Some(Secret::new("correct horse".into()));
    })
    .await
}

#[tokio::test]
async fn admin_routes_require_basic_credentials() {
    let app = spawn_protected_app().await;
    let test_cases = vec![
        (Method::GET, "/api/admin/api-keys"),
        (Method::POST, "/api/admin/api-keys"),
        (Method::PUT, "/api/admin/api-keys/foo.com"),
        (Method::POST, "/api/admin/api-keys/foo.com/deactivate"),
        (Method::DELETE, "/api/admin/api-keys/foo.com"),
        (Method::POST, "/api/admin/api-keys/invalidate"),
    ];

    for (method, route) in test_cases {
        let response = app
            .anonymous(method.clone(), route)
            .json(&json!({ "domain": "foo.com", "api_key": "re_x" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 401, "{} {} was not guarded", method, route);
        assert_eq!(
            response.headers()["WWW-Authenticate"],
            r#"Basic realm="admin""#
        );
    }
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = spawn_protected_app().await;

    let response = app
        .anonymous(Method::GET, "/api/admin/api-keys")
        .basic_auth("admin", Some("guess"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn a_stored_key_is_used_by_the_next_send() {
    let app = spawn_protected_app().await;
    Mock::given(path("/emails"))
        .and(header("Authorization", "Bearer re_bar_stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_bar" })))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let created = app
        .admin(Method::POST, "/api/admin/api-keys")
        .json(&json!({ "domain": "Bar.io", "api_key": "re_bar_stored", "description": "bar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let created: serde_json::Value = created.json().await.unwrap();
    assert_eq!(created["domain"], "bar.io");
    assert_eq!(created["active"], true);
    assert!(!created.to_string().contains("re_bar_stored"));

    let response = app
        .post_send(&json!({ "to": "a@example.net", "domain": "bar.io", "subject": "Hi", "text": "x" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn keys_can_be_listed_updated_deactivated_and_deleted() {
    let app = spawn_protected_app().await;
    app.admin(Method::POST, "/api/admin/api-keys")
        .json(&json!({ "domain": "foo.com", "api_key": "re_one" }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let updated = app
        .admin(Method::PUT, "/api/admin/api-keys/foo.com")
        .json(&json!({ "description": "primary" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);

    let deactivated: serde_json::Value = app
        .admin(Method::POST, "/api/admin/api-keys/foo.com/deactivate")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deactivated["active"], false);

    let listed: serde_json::Value = app
        .admin(Method::GET, "/api/admin/api-keys")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["api_keys"][0]["description"], "primary");

    let deleted = app
        .admin(Method::DELETE, "/api/admin/api-keys/foo.com")
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let missing = app
        .admin(Method::DELETE, "/api/admin/api-keys/foo.com")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn invalid_admin_input_is_a_bad_request() {
    let app = spawn_protected_app().await;

    let response = app
        .admin(Method::POST, "/api/admin/api-keys")
        .json(&json!({ "domain": "not a domain", "api_key": "re_x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn admin_routes_are_open_without_a_password() {
    let app = spawn_app().await;

    let response = app
        .anonymous(Method::POST, "/api/admin/api-keys/invalidate")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn domains_report_where_their_key_comes_from() {
    let app = spawn_app().await;

    let body: serde_json::Value = app.get("/api/domains").await.json().await.unwrap();

    assert_eq!(body["primary"], "foo.com");
    assert_eq!(body["domains"][0]["domain"], "foo.com");
    assert_eq!(body["domains"][0]["source"], "configuration");
    assert_eq!(body["domains"][0]["default_sender"], "noreply@foo.com");
    assert_eq!(body["domains"][1]["source"], "default");
}
