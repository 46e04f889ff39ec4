use crate::helpers::spawn_app;
use mailgate::domain::outbound::models::message::DeliveryStatus;
use serde_json::json;
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn email_for(domain: &str) -> serde_json::Value {
    json!({
        "to": "ursula@example.net",
        "domain": domain,
        "subject": "Hello",
        "text": "Plain body",
    })
}

#[tokio::test]
async fn send_for_a_domain_uses_its_key_and_records_the_message() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(method("POST"))
        .and(header("Authorization", "Bearer re_foo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_1" })))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let response = app.post_send(&email_for("foo.com")).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], "msg_1");
    assert_eq!(body["domain"], "foo.com");
    assert_eq!(body["from"], "noreply@foo.com");

    let sent = app.db.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].domain, "foo.com");
    assert_eq!(sent[0].from, "noreply@foo.com");
    assert_eq!(sent[0].status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn domain_without_its_own_key_uses_the_default_key() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(header("Authorization", "Bearer re_default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_2" })))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let response = app.post_send(&email_for("bar.io")).await;

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_reaching_the_provider() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;
    let oversized = base64::encode(vec![0u8; 15 * 1024 * 1024]);
    let test_cases = vec![
        (json!({ "subject": "Hi", "text": "x" }), "missing recipient"),
        (json!({ "to": "not-an-email", "subject": "Hi", "text": "x" }), "invalid recipient"),
        (json!({ "to": "a@b.com", "text": "x" }), "missing subject"),
        (json!({ "to": "a@b.com", "subject": "Hi" }), "missing body"),
        (
            json!({
                "to": "a@b.com",
                "subject": "Hi",
                "text": "x",
                "attachments": [{ "filename": "big.bin", "content": oversized }]
            }),
            "15 MiB attachment",
        ),
    ];

    for (body, description) in test_cases {
        let response = app.post_send(&body).await;

        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not reject a request with {}.",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string(), "No error message for {}", description);
    }
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(&format!("{}/api/send", &app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn provider_errors_are_passed_through() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "statusCode": 422,
            "message": "Invalid `to` field.",
            "name": "validation_error"
        })))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let response = app.post_send(&email_for("foo.com")).await;

    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid `to` field.");
    assert!(app.db.sent_messages().is_empty());
}

#[tokio::test]
async fn missing_key_is_a_configuration_error() {
    let app = crate::helpers::spawn_app_with(|c| {
        c.email_client.default_api_key = None;
    })
    .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let response = app.post_send(&email_for("bar.io")).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No API key configured for domain bar.io");
}
