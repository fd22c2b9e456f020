//! HTTP-level tests for the A2A server router.

#![cfg(feature = "server")]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use parley_a2a::{A2aServer, AgentCard, Dispatcher, ReferenceExecutor};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

fn router() -> Router {
    let dispatcher = Dispatcher::builder(ReferenceExecutor::new(Duration::ZERO)).build();
    A2aServer::new(dispatcher).router()
}

fn rpc(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_ping_over_http() {
    let response = router()
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["status"], "pong");
}

#[tokio::test]
async fn test_errors_are_http_200() {
    let response = router()
        .oneshot(rpc(json!({ "jsonrpc": "2.0", "id": 1, "method": "nope" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["error"]["code"], -32601);
}

#[tokio::test]
async fn test_non_json_content_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("ping"))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32005);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"jsonrpc\":"))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(body_json(response).await["error"]["code"], -32700);
}

#[tokio::test]
async fn test_well_known_agent_card() {
    for uri in ["/.well-known/agent.json", "/.well-known/agent-card.json"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let card = body_json(response).await;
        assert_eq!(card["name"], "Parley Reference Agent");
        assert_eq!(card["protocolVersion"], "0.3");
    }
}

#[tokio::test]
async fn test_message_stream_is_event_stream() {
    let response = router()
        .oneshot(rpc(json!({
            "jsonrpc": "2.0",
            "id": "s1",
            "method": "message/stream",
            "params": {
                "message": {
                    "messageId": "m1",
                    "role": "user",
                    "parts": [{ "kind": "text", "text": "hello" }]
                }
            }
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let text = body_text(response).await;
    let frames: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    assert!(frames.len() >= 3);
    assert_eq!(frames[0]["result"]["kind"], "task");
    let last = frames.last().unwrap();
    assert_eq!(last["result"]["status"]["state"], "completed");
    assert_eq!(last["result"]["final"], true);
}

#[tokio::test]
async fn test_bearer_token_unlocks_extended_card() {
    let dispatcher = Dispatcher::builder(ReferenceExecutor::default())
        .extended_card(AgentCard::new("Parley Internal", "http://localhost:8080"))
        .build();
    let app = A2aServer::new(dispatcher)
        .with_auth_token(Some("secret".to_string()))
        .router();
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "agent/getAuthenticatedExtendedCard" });

    let anonymous = app.clone().oneshot(rpc(body.clone())).await.unwrap();
    assert_eq!(body_json(anonymous).await["error"]["code"], -31401);

    let mut request = rpc(body);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
    let authorized = app.oneshot(request).await.unwrap();
    assert_eq!(body_json(authorized).await["result"]["name"], "Parley Internal");
}
