use crate::helpers::{spawn_app, SequentialIds};
use serde_json::json;
use wiremock::matchers::path;
use wiremock::Mock;

#[tokio::test]
async fn sent_history_and_stats_reflect_sends() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .respond_with(SequentialIds::default())
        .mount(&app.email_server)
        .await;
    for domain in ["foo.com", "bar.io"] {
        app.post_send(&json!({ "to": "a@example.net", "domain": domain, "subject": "Hi", "text": "x" }))
            .await
            .error_for_status()
            .unwrap();
    }

    let all: serde_json::Value = app.get("/api/emails/sent").await.json().await.unwrap();
    let bar: serde_json::Value = app
        .get("/api/emails/sent?domain=BAR.io&limit=10")
        .await
        .json()
        .await
        .unwrap();
    let stats: serde_json::Value = app.get("/api/stats").await.json().await.unwrap();

    assert_eq!(all["emails"].as_array().unwrap().len(), 2);
    assert_eq!(all["limit"], 50);
    assert_eq!(bar["emails"].as_array().unwrap().len(), 1);
    assert_eq!(bar["emails"][0]["domain"], "bar.io");
    assert_eq!(stats["sent_total"], 2);
    assert_eq!(stats["sent_by_status"]["sent"], 2);
    assert_eq!(stats["received_total"], 0);
}

#[tokio::test]
async fn unknown_received_message_is_not_found() {
    let app = spawn_app().await;

    let response = app.get("/api/emails/received/missing").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn an_unavailable_store_reads_empty() {
    let app = spawn_app().await;
    app.db.set_unavailable(true);

    let response = app.get("/api/emails/received").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["emails"].as_array().unwrap().is_empty());
}
