use super::request_id::REQUEST_ID_HEADER;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

/// Route template for the log line, so `/scans/17` and `/scans/18` group together.
pub(crate) fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = route_label(&req);
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        warn!(
            target: "metrics",
            %method, %route, status, latency_ms, %request_id,
            "scan_api_request_failed"
        );
    } else {
        info!(
            target: "metrics",
            %method, %route, status, latency_ms, %request_id,
            "scan_api_request"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn,
        routing::get,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_response_passes_through() {
        let app = Router::new()
            .route("/scans/:id", get(|| async { StatusCode::ACCEPTED }))
            .layer(from_fn(metrics_middleware));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/scans/17")
                    .header(REQUEST_ID_HEADER, "req-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_route_label_falls_back_to_raw_path() {
        let req = HttpRequest::builder()
            .uri("/api/v1/scans/17?x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&req), "/api/v1/scans/17");
    }
}
