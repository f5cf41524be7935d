//! Relay integration tests.
//!
//! Tests verify:
//! - Full and partial relays (status, headers, exact bytes)
//! - Adjacent ranges reassemble the full object
//! - Classifier override drives range eligibility
//! - Upstreams that ignore ranges are trimmed by the gateway
//! - Client disconnect closes the upstream stream
//! - Mid-stream upstream failure truncates the body

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;

use super::test_utils::{
    body_bytes, header, media_request, router_for, router_with_timeout, send, test_payload,
    video_store, MockMediaStore,
};

// =============================================================================
// Full Relay
// =============================================================================

#[tokio::test]
async fn test_full_video_without_range() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/abc123", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("video/mp4"));
    assert_eq!(header(&response, "content-length"), Some("1000"));
    assert_eq!(header(&response, "accept-ranges"), Some("bytes"));
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=86400")
    );

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 1000);
    assert_eq!(&body[..], &test_payload(1000)[..]);

    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.opened_ranges(), vec![None]);
    assert!(counters.wait_for_streams_closed().await);
}

#[tokio::test]
async fn test_full_body_matches_size_for_various_lengths() {
    for len in [0usize, 1, 63, 64, 65, 4096] {
        let store = MockMediaStore::new().with_object("id", "videos/v.mp4", test_payload(len));
        let router = router_for(store);

        let response = send(&router, media_request("GET", "/media/id", None)).await;
        assert_eq!(response.status(), StatusCode::OK, "len {}", len);

        let body = body_bytes(response).await;
        assert_eq!(body.len(), len);
    }
}

#[tokio::test]
async fn test_image_served_without_range_headers() {
    let store = MockMediaStore::new().with_object("photo", "photos/file_9.jpg", test_payload(300));
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/photo", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/jpeg"));
    assert!(header(&response, "accept-ranges").is_none());
    assert!(header(&response, "content-length").is_none());
    assert_eq!(body_bytes(response).await.len(), 300);
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    use media_gateway::{create_router, MediaService, RouterConfig};

    let service = MediaService::new(video_store(), Duration::from_secs(5));
    let router = create_router(
        service,
        RouterConfig::new()
            .with_cache_max_age(60)
            .with_tracing(false),
    );

    let response = send(&router, media_request("GET", "/media/abc123", None)).await;
    assert_eq!(header(&response, "cache-control"), Some("public, max-age=60"));
}

// =============================================================================
// Partial Relay
// =============================================================================

#[tokio::test]
async fn test_open_ended_range() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=500-")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some("bytes 500-999/1000")
    );
    assert_eq!(header(&response, "content-length"), Some("500"));
    assert_eq!(header(&response, "accept-ranges"), Some("bytes"));

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 500);
    assert_eq!(&body[..], &test_payload(1000)[500..]);

    let ranges = counters.opened_ranges();
    assert_eq!(ranges.len(), 1);
    let forwarded = ranges[0].unwrap();
    assert_eq!((forwarded.start, forwarded.end), (500, 999));
}

#[tokio::test]
async fn test_ranges_return_exact_slices() {
    let payload = test_payload(1000);
    let router = router_for(video_store());

    for (start, end) in [(0u64, 0u64), (0, 99), (10, 10), (250, 749), (999, 999)] {
        let range = format!("bytes={}-{}", start, end);
        let response = send(
            &router,
            media_request("GET", "/media/abc123", Some(&range)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let expected_range = format!("bytes {}-{}/1000", start, end);
        assert_eq!(header(&response, "content-range"), Some(expected_range.as_str()));

        let body = body_bytes(response).await;
        assert_eq!(body.len() as u64, end - start + 1);
        assert_eq!(&body[..], &payload[start as usize..=end as usize]);
    }
}

#[tokio::test]
async fn test_adjacent_ranges_concatenate_to_full_object() {
    let router = router_for(video_store());

    let full = body_bytes(send(&router, media_request("GET", "/media/abc123", None)).await).await;

    for split in [1u64, 333, 500, 999] {
        let first = send(
            &router,
            media_request("GET", "/media/abc123", Some(&format!("bytes=0-{}", split - 1))),
        )
        .await;
        let second = send(
            &router,
            media_request("GET", "/media/abc123", Some(&format!("bytes={}-999", split))),
        )
        .await;

        let mut joined = body_bytes(first).await.to_vec();
        joined.extend_from_slice(&body_bytes(second).await);
        assert_eq!(joined, full.to_vec(), "split at {}", split);
    }
}

#[tokio::test]
async fn test_suffix_range() {
    let router = router_for(video_store());

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=-100")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some("bytes 900-999/1000")
    );
    assert_eq!(&body_bytes(response).await[..], &test_payload(1000)[900..]);
}

#[tokio::test]
async fn test_end_past_object_is_clamped() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=900-5000")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some("bytes 900-999/1000")
    );
    assert_eq!(body_bytes(response).await.len(), 100);

    // The clamped range is what goes upstream
    let forwarded = counters.opened_ranges()[0].unwrap();
    assert_eq!(forwarded.end, 999);
}

#[tokio::test]
async fn test_octet_stream_overridden_by_extension_enables_range() {
    let store = MockMediaStore::new()
        .with_object("clip", "videos/clip.mp4", test_payload(1000))
        .with_reported_type("clip", "application/octet-stream");
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/clip", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("video/mp4"));

    let response = send(
        &router,
        media_request("GET", "/media/clip", Some("bytes=0-499")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some("bytes 0-499/1000")
    );
    assert_eq!(body_bytes(response).await.len(), 500);
}

#[tokio::test]
async fn test_upstream_ignoring_range_is_trimmed() {
    let store = video_store().ignoring_ranges().with_chunk_size(37);
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=100-199")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = body_bytes(response).await;
    assert_eq!(&body[..], &test_payload(1000)[100..200]);
}

#[tokio::test]
async fn test_probe_fills_missing_size() {
    let store = video_store().without_reported_size("abc123");
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/abc123", Some("bytes=0-9")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "content-range"), Some("bytes 0-9/1000"));
    assert_eq!(counters.lookups(), 1);
    assert_eq!(counters.probes(), 1);
}

// =============================================================================
// HEAD
// =============================================================================

#[tokio::test]
async fn test_head_returns_headers_without_fetching_bytes() {
    let store = video_store();
    let counters = store.counters();
    let router = router_for(store);

    let response = send(&router, media_request("HEAD", "/media/abc123", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-length"), Some("1000"));
    assert_eq!(header(&response, "content-type"), Some("video/mp4"));

    let response = send(
        &router,
        media_request("HEAD", "/media/abc123", Some("bytes=500-")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some("bytes 500-999/1000")
    );
    assert!(body_bytes(response).await.is_empty());

    assert_eq!(counters.lookups(), 2);
    assert_eq!(counters.opens(), 0);
}

// =============================================================================
// Cancellation and Failure
// =============================================================================

#[tokio::test]
async fn test_client_disconnect_closes_upstream_stream() {
    let store = MockMediaStore::new()
        .with_object("big", "videos/big.mp4", test_payload(1024 * 1024))
        .with_chunk_size(1024);
    let counters = store.counters();
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/big", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Read a little, then hang up
    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    assert_eq!(counters.live_streams(), 1);

    drop(body);

    assert!(counters.wait_for_streams_closed().await);
}

#[tokio::test]
async fn test_disconnect_during_partial_relay_with_slow_upstream() {
    let store = MockMediaStore::new()
        .with_object("slow", "videos/slow.webm", test_payload(64 * 1024))
        .with_chunk_size(512)
        .with_chunk_delay(Duration::from_millis(20));
    let counters = store.counters();
    let router = router_for(store);

    let response = send(
        &router,
        media_request("GET", "/media/slow", Some("bytes=1000-")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "content-type"), Some("video/webm"));

    drop(response);

    assert!(counters.wait_for_streams_closed().await);
}

#[tokio::test]
async fn test_health_reports_active_relays() {
    let store = MockMediaStore::new()
        .with_object("big", "videos/big.mp4", test_payload(1024 * 1024))
        .with_chunk_size(1024);
    let counters = store.counters();
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/big", None)).await;
    let health = send(&router, media_request("GET", "/health", None)).await;
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(health).await).unwrap();
    assert_eq!(json["active_relays"], 1);

    drop(response);
    assert!(counters.wait_for_streams_closed().await);

    let health = send(&router, media_request("GET", "/health", None)).await;
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(health).await).unwrap();
    assert_eq!(json["active_relays"], 0);
}

#[tokio::test]
async fn test_mid_stream_failure_truncates_body() {
    let store = video_store().failing_after(300);
    let counters = store.counters();
    let router = router_for(store);

    let response = send(&router, media_request("GET", "/media/abc123", None)).await;

    // Headers were already committed
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-length"), Some("1000"));

    let mut body = response.into_body().into_data_stream();
    let mut received = 0;
    let mut errored = false;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => received += chunk.len(),
            Err(_) => {
                errored = true;
                break;
            }
        }
    }

    assert!(errored);
    assert_eq!(received, 300);
    assert!(counters.wait_for_streams_closed().await);
}

#[tokio::test]
async fn test_stalled_first_chunk_is_transport_error() {
    let store = video_store().stalling();
    let counters = store.counters();
    let router = router_with_timeout(store, Duration::from_millis(100));

    let response = send(&router, media_request("GET", "/media/abc123", None)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"], "upstream_error");
    assert!(counters.wait_for_streams_closed().await);
}
