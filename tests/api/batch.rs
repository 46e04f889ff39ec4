use crate::helpers::{spawn_app, SequentialIds};
use serde_json::json;
use wiremock::matchers::{body_partial_json, path};
use wiremock::{Mock, ResponseTemplate};

fn email(to: &str) -> serde_json::Value {
    json!({ "to": to, "subject": "Batch", "text": "Hello", "domain": "foo.com" })
}

#[tokio::test]
async fn one_failing_item_does_not_affect_the_others() {
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(body_partial_json(json!({ "to": ["rejected@example.net"] })))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "statusCode": 422,
            "message": "Invalid `to` field.",
            "name": "validation_error"
        })))
        .with_priority(1)
        .mount(&app.email_server)
        .await;
    Mock::given(path("/emails"))
        .respond_with(SequentialIds::default())
        .expect(3)
        .mount(&app.email_server)
        .await;
    let emails: Vec<_> = [
        "a@example.net",
        "b@example.net",
        "rejected@example.net",
        "c@example.net",
    ]
    .iter()
    .map(|to| email(to))
    .collect();

    let response = app.post_send_batch(&json!({ "emails": emails })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    for (index, result) in results.iter().enumerate() {
        assert_eq!(result["index"], index);
        assert_eq!(result["success"], index != 2);
    }
    assert_eq!(results[2]["status_code"], 422);
    assert_eq!(results[2]["error"], "Invalid `to` field.");
    assert_eq!(body["sent"], 3);
    assert_eq!(body["failed"], 1);
    let recorded = app.db.sent_messages();
    assert_eq!(recorded.len(), 3);
    assert!(recorded
        .iter()
        .all(|m| m.to != vec!["rejected@example.net".to_string()]));
}

#[tokio::test]
async fn empty_and_oversized_batches_are_rejected() {
    let app = spawn_app().await;
    let too_many: Vec<_> = (0..101).map(|i| email(&format!("u{}@example.net", i))).collect();

    for body in [json!({ "emails": [] }), json!({ "emails": too_many })] {
        let response = app.post_send_batch(&body).await;

        assert_eq!(response.status().as_u16(), 400);
    }
}
