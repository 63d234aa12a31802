//! Tracking pixel endpoint
//!
//! Two branches, one response: whether the tracking id resolves, the
//! recording works, or anything in between fails, the caller receives
//! the same PNG bytes and the same cache-suppression headers. A mail
//! client must never be able to tell the difference.

use hyper::{Body, HeaderMap, Response, StatusCode};
use tracing::{debug, warn};

use crate::services::tracking;
use crate::state::AppState;

/// 1x1 PNG served on every request.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x08, 0xd7, 0x63, 0xf8,
    0x0f, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xdd, 0x8d, 0xb4, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

pub async fn respond(state: &AppState, tracking_id: &str, headers: &HeaderMap) -> Response<Body> {
    let source_ip = client_ip(headers);
    let user_agent = headers
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Recording is best-effort; every arm below falls through to the
    // identical image response.
    match tracking::record_open(&state.pool, tracking_id, &source_ip, &user_agent) {
        Ok(Some(open_id)) => {
            debug!(tracking_id = %tracking_id, open_id = %open_id, ip = %source_ip, "Pixel open recorded");
        }
        Ok(None) => {
            debug!(tracking_id = %tracking_id, "Pixel served without a matching tracked email");
        }
        Err(e) => {
            warn!("Pixel recording failed for {}: {}", tracking_id, e);
        }
    }

    pixel_response()
}

/// Client address, most-trustworthy header first. Proxies prepend to
/// x-forwarded-for, so the first hop is the original client.
fn client_ip(headers: &HeaderMap) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    if let Some(forwarded) = header_value("x-forwarded-for") {
        if let Some(first_hop) = forwarded.split(',').next() {
            let first_hop = first_hop.trim();
            if !first_hop.is_empty() {
                return first_hop.to_string();
            }
        }
    }

    header_value("x-real-ip")
        .or_else(|| header_value("cf-connecting-ip"))
        .or_else(|| header_value("x-client-ip"))
        .unwrap_or_else(|| "unknown".to_string())
}

fn pixel_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "image/png")
        .header(
            hyper::header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate",
        )
        .body(Body::from(PIXEL_PNG))
        .unwrap_or_else(|_| Response::new(Body::from(PIXEL_PNG)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{pool::create_memory_pool, schema::initialize_schema, users};
    use crate::config::AppConfig;
    use crate::services::tracking::create_tracked_email;
    use crate::state::SessionStore;

    fn test_state() -> AppState {
        let pool = create_memory_pool().unwrap();
        initialize_schema(&pool.get().unwrap()).unwrap();
        AppState {
            pool,
            config: AppConfig::default(),
            sessions: SessionStore::default(),
        }
    }

    async fn response_parts(response: Response<Body>) -> (StatusCode, Vec<(String, String)>, Vec<u8>) {
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    #[tokio::test]
    async fn known_and_unknown_ids_produce_identical_responses() {
        let state = test_state();
        let user = users::upsert(&state.pool, "a@example.com", "s").unwrap();
        let tracked =
            create_tracked_email(&state.pool, &user.id, "r@example.com", "", "").unwrap();

        let known = respond(&state, &tracked.tracking_id, &HeaderMap::new()).await;
        let unknown = respond(&state, "nonexistent-id", &HeaderMap::new()).await;

        let known = response_parts(known).await;
        let unknown = response_parts(unknown).await;
        assert_eq!(known, unknown);

        assert_eq!(known.0, StatusCode::OK);
        assert_eq!(known.2, PIXEL_PNG);
        assert!(known
            .1
            .contains(&("cache-control".to_string(), "no-cache, no-store, must-revalidate".to_string())));
        assert!(known
            .1
            .contains(&("content-type".to_string(), "image/png".to_string())));
    }

    #[tokio::test]
    async fn every_fetch_of_a_known_id_inserts_one_open_row() {
        let state = test_state();
        let user = users::upsert(&state.pool, "a@example.com", "s").unwrap();
        let tracked =
            create_tracked_email(&state.pool, &user.id, "r@example.com", "", "").unwrap();

        respond(&state, &tracked.tracking_id, &HeaderMap::new()).await;
        respond(&state, &tracked.tracking_id, &HeaderMap::new()).await;
        respond(&state, &tracked.tracking_id, &HeaderMap::new()).await;

        let opens: i64 = state
            .pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM email_opens", [], |row| row.get(0))
            .unwrap();
        assert_eq!(opens, 3);
    }

    #[tokio::test]
    async fn recording_failure_still_serves_the_pixel() {
        let state = test_state();
        let user = users::upsert(&state.pool, "a@example.com", "s").unwrap();
        let tracked =
            create_tracked_email(&state.pool, &user.id, "r@example.com", "", "").unwrap();

        // Break the opens table out from under the handler
        state
            .pool
            .get()
            .unwrap()
            .execute_batch("DROP TABLE email_opens")
            .unwrap();

        let response = respond(&state, &tracked.tracking_id, &HeaderMap::new()).await;
        let (status, _, body) = response_parts(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, PIXEL_PNG);
    }

    #[test]
    fn client_ip_prefers_the_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn client_ip_falls_through_the_header_chain() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", "198.51.100.7".parse().unwrap());
        assert_eq!(client_ip(&headers), "198.51.100.7");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
