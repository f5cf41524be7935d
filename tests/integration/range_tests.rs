//! Range policy integration tests.
//!
//! Tests verify:
//! - Unsatisfiable ranges answer 416 without touching upstream bytes
//! - Malformed headers are rejected with 400
//! - Ranges that are not honored (multi-range, non-video, unknown size)
//!   fall back to the full object

use axum::http::StatusCode;

use super::test_utils::{
    body_bytes, header, media_request, router_for, send, test_payload, video_store,
    MockMediaStore,
};

#[tokio::test]
async fn test_start_beyond_size_is_unsatisfiable() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=2000-3000")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&response, "content-range"), Some("bytes */1000"));
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(counters.opens(), 0);
}

#[tokio::test]
async fn test_start_equal_to_size_is_unsatisfiable() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    for range in ["bytes=1000-", "bytes=1000-1000", "bytes=-0"] {
        let response = send(&router, media_request("GET", "/media/abc123", Some(range))).await;
        assert_eq!(
            response.status(),
            StatusCode::RANGE_NOT_SATISFIABLE,
            "range {}",
            range
        );
    }
    assert_eq!(counters.opens(), 0);
}

#[tokio::test]
async fn test_head_unsatisfiable() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("HEAD", "/media/abc123", Some("bytes=5000-")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&response, "content-range"), Some("bytes */1000"));
    assert_eq!(counters.opens(), 0);
}

#[tokio::test]
async fn test_malformed_ranges_rejected() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    for range in [
        "bytes=abc-",
        "bytes=-",
        "bytes=10-5",
        "items=0-10",
        "bytes=+5-10",
        "0-10",
    ] {
        let response = send(&router, media_request("GET", "/media/abc123", Some(range))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "range {}", range);

        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["error"], "invalid_range");
        assert_eq!(json["status"], 400);
    }
    assert_eq!(counters.opens(), 0);
}

#[tokio::test]
async fn test_multi_range_served_in_full() {
    let router = router_for(video_store());

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=0-1,4-5")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "content-range").is_none());
    assert_eq!(body_bytes(response).await.len(), 1000);
}

#[tokio::test]
async fn test_range_on_image_is_ignored() {
    let store = MockMediaStore::new().with_object("pic", "photos/pic.png", test_payload(400));
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/pic", Some("bytes=0-99")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/png"));
    assert!(header(&response, "content-range").is_none());
    assert_eq!(body_bytes(response).await.len(), 400);
    assert_eq!(counters.opened_ranges(), vec![None]);
}

#[tokio::test]
async fn test_range_on_unknown_type_is_ignored() {
    let store = MockMediaStore::new()
        .with_object("doc", "documents/file_3", test_payload(200))
        .with_reported_type("doc", "application/pdf");
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/doc", Some("bytes=-10")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("application/pdf"));
    assert_eq!(body_bytes(response).await.len(), 200);
}

#[tokio::test]
async fn test_video_reported_type_without_extension_supports_range() {
    let store = MockMediaStore::new()
        .with_object("note", "video_notes/file_7", test_payload(1000))
        .with_reported_type("note", "video/mp4");
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/note", Some("bytes=0-9")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "content-range"), Some("bytes 0-9/1000"));
}
