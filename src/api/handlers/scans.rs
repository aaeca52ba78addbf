use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::CurrentUser;
use crate::api::response::{ApiResult, created, ok};
use crate::entities::file_scans::{self, ScanStatus};
use crate::services::scan_service::{ScanView, UploadedFile};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct ScanResponse {
    pub id: i32,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub file_type: String,
    pub md5_hash: String,
    pub sha1_hash: String,
    pub sha256_hash: String,
    pub status: ScanStatus,
    pub provider_scan_id: Option<String>,
    pub scan_submitted_at: Option<DateTime<Utc>>,
    pub result_available_at: Option<DateTime<Utc>>,
    pub positives: Option<i32>,
    pub total_scans: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Provider report, attached on reads of completed scans when available
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detailed_report: Option<Value>,
}

impl From<file_scans::Model> for ScanResponse {
    fn from(record: file_scans::Model) -> Self {
        Self {
            id: record.id,
            filename: record.filename,
            original_filename: record.original_filename,
            file_size: record.file_size,
            file_type: record.file_type,
            md5_hash: record.md5_hash,
            sha1_hash: record.sha1_hash,
            sha256_hash: record.sha256_hash,
            status: record.status,
            provider_scan_id: record.provider_scan_id,
            scan_submitted_at: record.scan_submitted_at,
            result_available_at: record.result_available_at,
            positives: record.positives,
            total_scans: record.total_scans,
            error_message: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
            detailed_report: None,
        }
    }
}

impl From<ScanView> for ScanResponse {
    fn from(view: ScanView) -> Self {
        Self {
            detailed_report: view.detailed_report,
            ..view.record.into()
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ListScansQuery {
    /// Records to skip (default 0)
    #[serde(default)]
    #[validate(range(min = 0, message = "skip must be greater than or equal to 0"))]
    pub skip: i64,
    /// Page size, 1 to 100 (default 10)
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct MarkErrorRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/scans/upload",
    request_body(content = Object, description = "File to scan in the `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File accepted and submitted for scanning", body = ScanResponse),
        (status = 400, description = "No file in request"),
        (status = 422, description = "Empty filename, extension not allowed, or file too large"),
        (status = 502, description = "Scan provider rejected the submission; the record stays pending")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "scans"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<ScanResponse> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        upload = Some(UploadedFile {
            filename,
            content_type,
            content,
        });
        break;
    }

    let upload =
        upload.ok_or_else(|| AppError::BadRequest("No file found in request".to_string()))?;

    let record = state
        .scan_service
        .accept_upload(current.id(), &upload)
        .await?;
    let record = state
        .scan_service
        .submit_for_scanning(&record, upload.content)
        .await?;

    created("File uploaded and submitted for scanning", record.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/scans",
    params(ListScansQuery),
    responses(
        (status = 200, description = "Scans owned by the caller, oldest first", body = [ScanResponse]),
        (status = 422, description = "Invalid paging parameters")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "scans"
)]
pub async fn list_scans(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListScansQuery>,
) -> ApiResult<Vec<ScanResponse>> {
    query.validate()?;

    let records = state
        .scan_service
        .list_scans(current.id(), query.skip as u64, query.limit as u64)
        .await?;

    ok(
        "Scans retrieved successfully",
        records.into_iter().map(ScanResponse::from).collect(),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/scans/{id}",
    params(("id" = i32, Path, description = "Scan id")),
    responses(
        (status = 200, description = "Scan, refreshed from the provider while scanning", body = ScanResponse),
        (status = 404, description = "Scan not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "scans"
)]
pub async fn get_scan(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<ScanResponse> {
    let view = state.scan_service.get_scan(id, current.id()).await?;
    ok("Scan retrieved successfully", view.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/scans/hash/{hash}",
    params(("hash" = String, Path, description = "MD5, SHA1 or SHA256 of the content")),
    responses(
        (status = 200, description = "Earliest matching scan owned by the caller", body = ScanResponse),
        (status = 404, description = "Scan not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "scans"
)]
pub async fn get_scan_by_hash(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(hash): Path<String>,
) -> ApiResult<ScanResponse> {
    let record = state.scan_service.find_by_hash(current.id(), &hash).await?;
    ok("Scan retrieved successfully", record.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/scans/{id}/error",
    params(("id" = i32, Path, description = "Scan id")),
    request_body = MarkErrorRequest,
    responses(
        (status = 200, description = "Scan moved to error", body = ScanResponse),
        (status = 403, description = "Not enough permissions"),
        (status = 404, description = "Scan not found"),
        (status = 422, description = "Scan already finished")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "scans"
)]
pub async fn mark_scan_error(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<MarkErrorRequest>,
) -> ApiResult<ScanResponse> {
    if !current.is_superuser() {
        return Err(AppError::Forbidden("Not enough permissions".to_string()));
    }
    payload.validate()?;

    let record = state.scan_service.mark_error(id, &payload.message).await?;
    ok("Scan marked as error", record.into())
}
