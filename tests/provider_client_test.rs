use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use malware_scan_backend::services::provider::{
    AnalysisStatus, ProviderError, ScanProvider, VirusTotalClient, VirusTotalConfig,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EICAR_SHA256: &str = "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

#[derive(Debug, Clone)]
struct SeenRequest {
    route: &'static str,
    api_key: Option<String>,
    accept: Option<String>,
    file: Option<(String, usize)>,
}

#[derive(Clone)]
struct MockVt {
    base: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockVt {
    fn record(&self, route: &'static str, headers: &HeaderMap, file: Option<(String, usize)>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().unwrap().push(SeenRequest {
            route,
            api_key: header("x-apikey"),
            accept: header("accept"),
            file,
        });
    }

    fn routes(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().iter().map(|r| r.route).collect()
    }
}

async fn read_file_field(multipart: &mut Multipart) -> Option<(String, usize)> {
    while let Some(field) = multipart.next_field().await.ok()? {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.ok()?;
            return Some((name, data.len()));
        }
    }
    None
}

async fn direct_upload(
    State(vt): State<MockVt>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    let file = read_file_field(&mut multipart).await;
    vt.record("POST /files", &headers, file);
    Json(json!({"data": {"type": "analysis", "id": "direct-123"}}))
}

async fn upload_url(State(vt): State<MockVt>, headers: HeaderMap) -> Json<Value> {
    vt.record("GET /files/upload_url", &headers, None);
    Json(json!({"data": format!("{}/upload-target", vt.base)}))
}

async fn large_upload(
    State(vt): State<MockVt>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    let file = read_file_field(&mut multipart).await;
    vt.record("POST /upload-target", &headers, file);
    Json(json!({"data": {"type": "analysis", "id": "large-456"}}))
}

async fn analysis(
    State(vt): State<MockVt>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    vt.record("GET /analyses", &headers, None);
    let attributes = match id.as_str() {
        "done" => json!({
            "status": "completed",
            "stats": {"malicious": 5, "suspicious": 0, "undetected": 55}
        }),
        "queued" => json!({
            "status": "queued",
            "stats": {"malicious": 0, "suspicious": 0, "undetected": 0}
        }),
        "nostats" => json!({}),
        _ => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    Json(json!({"data": {"id": id, "type": "analysis", "attributes": attributes}})).into_response()
}

async fn file_report(
    State(vt): State<MockVt>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Response {
    vt.record("GET /files/{hash}", &headers, None);
    if hash == EICAR_SHA256 || hash == "known" {
        Json(json!({
            "data": {
                "id": hash,
                "type": "file",
                "attributes": {"last_analysis_stats": {"malicious": 60}}
            }
        }))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": "NotFoundError"}})),
        )
            .into_response()
    }
}

/// Binds first so the router can hand out URLs pointing back at itself.
async fn spawn_with(build: impl FnOnce(String) -> Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

async fn spawn_mock_vt() -> (MockVt, String) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shared = seen.clone();
    let base = spawn_with(move |base| {
        Router::new()
            .route("/api/v3/files", post(direct_upload))
            .route("/api/v3/files/upload_url", get(upload_url))
            .route("/api/v3/files/:hash", get(file_report))
            .route("/api/v3/analyses/:id", get(analysis))
            .route("/upload-target", post(large_upload))
            .with_state(MockVt { base, seen: shared })
    })
    .await;

    (MockVt { base: base.clone(), seen }, base)
}

fn client_for(base: &str) -> VirusTotalClient {
    VirusTotalClient::new(
        VirusTotalConfig::new("test-key", format!("{}/api/v3", base))
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_small_file_is_posted_directly() {
    let (vt, base) = spawn_mock_vt().await;
    let client = client_for(&base);

    let scan_id = client
        .submit(Bytes::from_static(b"0123456789"), "a.exe", 10)
        .await
        .unwrap();
    assert_eq!(scan_id, "direct-123");

    let seen = vt.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].route, "POST /files");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(seen[0].accept.as_deref(), Some("application/json"));
    assert_eq!(seen[0].file, Some(("a.exe".to_string(), 10)));
}

#[tokio::test]
async fn test_threshold_size_is_still_direct() {
    let (vt, base) = spawn_mock_vt().await;
    let client = client_for(&base);

    client
        .submit(Bytes::from_static(b"abc"), "edge.bin", 32 * 1024 * 1024)
        .await
        .unwrap();
    assert_eq!(vt.routes(), vec!["POST /files"]);
}

#[tokio::test]
async fn test_large_file_uses_upload_url() {
    let (vt, base) = spawn_mock_vt().await;
    let client = client_for(&base);

    let scan_id = client
        .submit(Bytes::from_static(b"abc"), "big.zip", 40 * 1024 * 1024)
        .await
        .unwrap();
    assert_eq!(scan_id, "large-456");
    assert_eq!(
        vt.routes(),
        vec!["GET /files/upload_url", "POST /upload-target"]
    );

    let seen = vt.seen.lock().unwrap().clone();
    assert!(seen.iter().all(|r| r.api_key.as_deref() == Some("test-key")));
    assert_eq!(seen[1].file, Some(("big.zip".to_string(), 3)));
}

#[tokio::test]
async fn test_submit_without_id_is_protocol_error() {
    let base = spawn_with(|_| {
        Router::new().route(
            "/api/v3/files",
            post(|| async { Json(json!({"data": {"type": "analysis"}})) }),
        )
    })
    .await;

    let err = client_for(&base)
        .submit(Bytes::from_static(b"x"), "a.exe", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Protocol { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_submit_rejected_is_unavailable() {
    let base = spawn_with(|_| {
        Router::new().route(
            "/api/v3/files",
            post(|| async { (StatusCode::UNAUTHORIZED, "WrongCredentialsError") }),
        )
    })
    .await;

    let err = client_for(&base)
        .submit(Bytes::from_static(b"x"), "a.exe", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_upload_url_failures() {
    let base = spawn_with(|_| {
        Router::new().route(
            "/api/v3/files/upload_url",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        )
    })
    .await;
    let err = client_for(&base)
        .submit(Bytes::from_static(b"x"), "big.zip", 40 * 1024 * 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "{:?}", err);

    let base = spawn_with(|_| {
        Router::new().route(
            "/api/v3/files/upload_url",
            get(|| async { Json(json!({"data": "not a url"})) }),
        )
    })
    .await;
    let err = client_for(&base)
        .submit(Bytes::from_static(b"x"), "big.zip", 40 * 1024 * 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Protocol { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_poll_outcomes() {
    let (_vt, base) = spawn_mock_vt().await;
    let client = client_for(&base);

    match client.poll("done").await.unwrap() {
        AnalysisStatus::Completed(counts) => {
            assert_eq!(counts.malicious(), 5);
            assert_eq!(counts.total(), 60);
        }
        other => panic!("expected completed analysis, got {:?}", other),
    }
    assert_eq!(client.poll("queued").await.unwrap(), AnalysisStatus::NotReady);
    assert_eq!(client.poll("nostats").await.unwrap(), AnalysisStatus::NotReady);
    assert!(matches!(
        client.poll("boom").await.unwrap_err(),
        ProviderError::Unavailable { .. }
    ));
}

#[tokio::test]
async fn test_fetch_report() {
    let (_vt, base) = spawn_mock_vt().await;
    let client = client_for(&base);

    let report = client.fetch_report("known").await.unwrap();
    assert_eq!(report["id"], "known");
    assert_eq!(report["attributes"]["last_analysis_stats"]["malicious"], 60);

    assert!(matches!(
        client.fetch_report("unknown").await.unwrap_err(),
        ProviderError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_health_check() {
    let (_vt, base) = spawn_mock_vt().await;
    assert!(client_for(&base).health_check().await);

    let down = VirusTotalClient::new(
        VirusTotalConfig::new("test-key", "http://127.0.0.1:1/api/v3")
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    assert!(!down.health_check().await);
    assert!(matches!(
        down.poll("done").await.unwrap_err(),
        ProviderError::Unavailable { .. }
    ));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let base = spawn_with(|_| {
        Router::new().route(
            "/api/v3/analyses/:id",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        )
    })
    .await;

    let client = VirusTotalClient::new(
        VirusTotalConfig::new("test-key", format!("{}/api/v3", base))
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = client.poll("slow").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(4));
}
