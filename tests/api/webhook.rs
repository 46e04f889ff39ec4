use crate::helpers::{spawn_app, spawn_app_with};
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn arrival(email_id: &str) -> serde_json::Value {
    json!({
        "type": "email.received",
        "created_at": "2024-05-01T10:00:00Z",
        "data": {
            "email_id": email_id,
            "message_id": "<abc@mail.example.net>",
            "from": "Sender <sender@example.net>",
            "to": ["support@bar.io"],
            "cc": [],
            "subject": "Help",
            "attachments": []
        }
    })
}

async fn mount_received_content(app: &crate::helpers::TestApp, email_id: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/emails/receiving/{}", email_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": email_id,
            "html": "<p>Help me</p>",
            "text": "Help me",
            "headers": { "x-priority": "1" },
            "attachments": []
        })))
        .expect(calls)
        .mount(&app.email_server)
        .await;
}

#[tokio::test]
async fn duplicate_arrivals_are_stored_and_fetched_once() {
    let app = spawn_app().await;
    mount_received_content(&app, "in_1", 1).await;

    for _ in 0..2 {
        let response = app.post_webhook(&arrival("in_1")).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["received"], true);
    }
    app.tasks.drain().await;

    let received = app.db.received_messages();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].domain, "bar.io");
    assert_eq!(received[0].text.as_deref(), Some("Help me"));
    assert!(received[0].content_fetched_at.is_some());
    assert_eq!(app.db.webhook_events().len(), 2);
}

#[tokio::test]
async fn received_message_is_readable_with_its_state() {
    let app = spawn_app().await;
    mount_received_content(&app, "in_2", 1).await;

    app.post_webhook(&arrival("in_2")).await;
    app.tasks.drain().await;
    let response = app.get("/api/emails/received/in_2").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["provider_message_id"], "in_2");
    assert_eq!(body["state"], "content_fetched");
}

#[tokio::test]
async fn failed_fetches_leave_the_stub_in_place_until_a_manual_refetch() {
    let app = spawn_app().await;
    Mock::given(path("/emails/receiving/in_3"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&app.email_server)
        .await;

    app.post_webhook(&arrival("in_3")).await;
    app.tasks.drain().await;

    let received = app.db.received_messages();
    assert_eq!(received.len(), 1);
    assert!(received[0].content_fetched_at.is_none());
    assert_eq!(app.db.logs().len(), 1);

    mount_received_content(&app, "in_3", 1).await;
    let response = app.post("/api/emails/received/in_3/refetch").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["state"], "content_fetched");
    assert!(app.db.received_messages()[0].content_fetched_at.is_some());
}

#[tokio::test]
async fn delivery_notifications_update_the_sent_message() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "out_1" })))
        .mount(&app.email_server)
        .await;
    app.post_send(&json!({ "to": "a@example.net", "subject": "Hi", "text": "x" }))
        .await;

    let response = app
        .post_webhook(&json!({
            "type": "email.delivered",
            "created_at": "2024-05-01T10:00:00Z",
            "data": { "email_id": "out_1" }
        }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let sent = app.db.sent_messages();
    assert_eq!(sent[0].status.as_str(), "delivered");
    assert!(sent[0].delivered_at.is_some());
}

#[tokio::test]
async fn unknown_types_are_acknowledged() {
    let app = spawn_app().await;

    let response = app
        .post_webhook(&json!({
            "type": "contact.created",
            "data": { "to": "someone@foo.com", "attachments": [{ "size": "big" }] }
        }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(app.db.webhook_events().len(), 1);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = spawn_app().await;

    let not_json = reqwest::Client::new()
        .post(&format!("{}/webhook", &app.address))
        .body("definitely not json")
        .send()
        .await
        .unwrap();
    let untyped = app.post_webhook(&json!({ "data": {} })).await;

    assert_eq!(not_json.status().as_u16(), 400);
    assert_eq!(untyped.status().as_u16(), 400);
}

#[tokio::test]
async fn unsigned_notifications_are_refused_when_a_secret_is_configured() {
    let app = spawn_app_with(|c| {
        c.webhook.signing_secret = Some(Secret::new(
            "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw".into(),
        ));
    })
    .await;
    mount_received_content(&app, "in_4", 1).await;

    let unsigned = app.post_unsigned_webhook(&arrival("in_4")).await;
    assert_eq!(unsigned.status().as_u16(), 401);
    assert!(app.db.webhook_events().is_empty());

    let signed = app.post_webhook(&arrival("in_4")).await;
    app.tasks.drain().await;
    assert_eq!(signed.status().as_u16(), 200);
    assert_eq!(app.db.received_messages().len(), 1);
}
