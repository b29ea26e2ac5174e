use std::time::Duration;

use marquee_bot::telegram::{TelegramClient, TelegramNotifier, identity};
use marquee_core::intent::command_menu;
use marquee_core::router::Reply;
use marquee_core::services::Notifier;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:abc";

fn sent_message() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": { "message_id": 1, "chat": { "id": 42, "type": "private" } }
    }))
}

fn client(server: &MockServer) -> TelegramClient {
    TelegramClient::with_base_url(TOKEN.to_string(), server.uri())
}

#[tokio::test]
async fn test_get_updates_parses_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/getUpdates")))
        .and(body_partial_json(json!({ "offset": 7, "timeout": 30 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "message_id": 10,
                        "chat": { "id": 42, "type": "private" },
                        "from": { "id": 42, "is_bot": false, "username": "bob" },
                        "text": "add Dune"
                    }
                },
                { "update_id": 8 }
            ]
        })))
        .mount(&server)
        .await;

    let updates = client(&server)
        .get_updates(Some(7), Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(updates.len(), 2);
    let message = updates[0].message.as_ref().unwrap();
    assert!(message.chat.is_private());
    assert_eq!(message.text.as_deref(), Some("add Dune"));
    assert_eq!(identity(message.from.as_ref().unwrap().id), "telegram:42");
    assert!(updates[1].message.is_none());
}

#[tokio::test]
async fn test_reply_with_poster_is_a_captioned_photo() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendPhoto")))
        .and(body_partial_json(json!({
            "chat_id": 42,
            "photo": "https://images.test/dune.jpg",
            "caption": "Add the movie Dune (2021)?"
        })))
        .respond_with(sent_message())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(sent_message())
        .expect(0)
        .mount(&server)
        .await;

    let reply = Reply::text("Add the movie Dune (2021)?")
        .with_media(["https://images.test/dune.jpg".to_string()]);
    client(&server).send_reply(42, &reply).await.unwrap();
}

#[tokio::test]
async fn test_rejected_photo_falls_back_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendPhoto")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: wrong file identifier/HTTP URL specified"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 42, "text": "I found 2 matches:" })))
        .respond_with(sent_message())
        .expect(1)
        .mount(&server)
        .await;

    let reply = Reply::text("I found 2 matches:").with_media(["not-a-url".to_string()]);
    client(&server).send_reply(42, &reply).await.unwrap();
}

#[tokio::test]
async fn test_plain_reply_and_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send_reply(42, &Reply::text("Nothing to cancel."))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("blocked by the user"));
}

#[tokio::test]
async fn test_command_menu_is_registered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/setMyCommands")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).set_my_commands(&command_menu()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let commands: Vec<&str> = body["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|command| command["command"].as_str())
        .collect();
    assert!(commands.contains(&"add"));
    assert!(commands.contains(&"cancel"));
    assert!(!commands.contains(&"resetquota"));
}

#[tokio::test]
async fn test_notifier_only_reaches_telegram_identities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 42, "text": "bob requested the movie Heat (1995)." })))
        .respond_with(sent_message())
        .expect(1)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(client(&server));
    notifier
        .send("telegram:42", "bob requested the movie Heat (1995).")
        .await
        .unwrap();

    let err = notifier.send("discord:42", "hello").await.unwrap_err();
    assert!(err.to_string().contains("no transport for discord:42"));
    assert!(notifier.send("telegram:abc", "hello").await.is_err());
}
