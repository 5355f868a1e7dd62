//! HTTP store client against a mock overlay service.

use layover::error::StoreError;
use layover::overlay::{NewOverlay, OverlayId, OverlayKind, OverlayPatch, Position, Size, StreamId};
use layover::store::{HttpOverlayStore, OverlayStore};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpOverlayStore {
    HttpOverlayStore::new(
        &format!("{}/api", server.uri()),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_list_decodes_overlays_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/overlays/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "o1",
                "type": "text",
                "content": "Hello",
                "position": {"x": 50, "y": 50},
                "size": {"width": 200, "height": 60},
                "stream_id": "s1"
            },
            {
                "_id": "o2",
                "type": "image",
                "content": "https://cdn.example.com/a.png",
                "position": {"x": 10.6, "y": 20.2},
                "size": {"width": 0, "height": 150}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let overlays = client(&server).list(&StreamId::from("s1")).await.unwrap();

    assert_eq!(overlays.len(), 2);
    assert_eq!(overlays[0].id, OverlayId::from("o1"));
    assert_eq!(overlays[0].kind, OverlayKind::Text);
    assert_eq!(overlays[1].kind, OverlayKind::Image);
    assert_eq!(overlays[1].position, Position::new(11, 20));
    assert_eq!(overlays[1].stream_id, StreamId::from("s1"));
    assert!(overlays[1].size.is_positive(), "degenerate size is clamped");
}

#[tokio::test]
async fn test_create_accepts_id_only_acknowledgement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/overlays"))
        .and(body_json(json!({
            "type": "text",
            "content": "Hello",
            "position": {"x": 50, "y": 50},
            "size": {"width": 200, "height": 60},
            "stream_id": "s1"
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"_id": "abc123", "message": "Overlay created"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create(&NewOverlay::text("s1", "Hello"))
        .await
        .unwrap();

    assert_eq!(created.id, OverlayId::from("abc123"));
    assert_eq!(created.content, "Hello");
    assert_eq!(created.size, Size { width: 200, height: 60 });
}

#[tokio::test]
async fn test_update_sends_only_patched_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/overlays/o1"))
        .and(body_json(json!({"position": {"x": 120, "y": 80}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Overlay updated"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .update(&OverlayId::from("o1"), &OverlayPatch::position(120, 80))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejection_carries_store_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/overlays/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "Overlay not found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .delete(&OverlayId::from("missing"))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::rejected(404, "Overlay not found"));
}

#[tokio::test]
async fn test_rejection_without_json_body_uses_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/overlays/s1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server).list(&StreamId::from("s1")).await.unwrap_err();
    assert_eq!(err, StoreError::rejected(503, "maintenance"));
}

#[tokio::test]
async fn test_malformed_success_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/overlays/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).list(&StreamId::from("s1")).await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteRejected { status: 200, .. }));
}

#[tokio::test]
async fn test_list_tolerates_documents_without_geometry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/overlays/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "o1",
                "type": "text",
                "content": "Hello",
                "position": {"x": 10, "y": 20},
                "size": {"width": 200, "height": 60},
                "stream_id": "s1"
            },
            {
                "_id": "o2",
                "type": "text",
                "content": "Added elsewhere",
                "size": {"width": 80, "height": 30},
                "stream_id": "s1"
            },
            {
                "type": "text",
                "content": "No id at all"
            }
        ])))
        .mount(&server)
        .await;

    let overlays = client(&server).list(&StreamId::from("s1")).await.unwrap();

    assert_eq!(overlays.len(), 2);
    assert_eq!(overlays[0].position, Position::new(10, 20));
    assert_eq!(overlays[1].id, OverlayId::from("o2"));
    assert_eq!(overlays[1].position, Position::new(50, 50));
    assert_eq!(overlays[1].size, Size { width: 80, height: 30 });
}

#[tokio::test]
async fn test_unreachable_store_is_network_failure() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let store = HttpOverlayStore::new(
        &format!("http://{}/api", addr),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .unwrap();

    let err = store.list(&StreamId::from("s1")).await.unwrap_err();
    assert!(matches!(err, StoreError::Network(_)), "got {:?}", err);
}
