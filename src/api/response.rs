use axum::{Json, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseStatus {
    pub code: u16,
    pub message: String,
}

/// Success envelope: `{ "status": { "code", "message" }, "data": ... }`.
/// Errors use the same `status` block with `errors` instead of `data`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: ResponseStatus,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(code: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus {
                code: code.as_u16(),
                message: message.into(),
            },
            data,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), crate::api::error::AppError>;

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok((
        StatusCode::OK,
        Json(ApiResponse::new(StatusCode::OK, message, data)),
    ))
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED, message, data)),
    ))
}
