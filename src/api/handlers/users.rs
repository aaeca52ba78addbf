use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::CurrentUser;
use crate::api::response::{ApiResult, created, ok};
use crate::entities::users;
use crate::services::user_service::{NewUser, UserChanges};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            created_at: user.created_at,
        }
    }
}

/// Users may act on their own account; superusers on any.
fn ensure_self_or_superuser(current: &CurrentUser, user_id: i32) -> Result<(), AppError> {
    if current.id() == user_id || current.is_superuser() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Not enough permissions".to_string(),
        ))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 422, description = "Invalid input or email already registered")
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    payload.validate()?;

    let user = state
        .user_service
        .create(NewUser {
            email: payload.email,
            password: payload.password,
            full_name: payload.full_name,
            is_superuser: false,
        })
        .await?;

    created("User created successfully", user.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn read_current_user(
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<UserResponse> {
    ok("User retrieved successfully", current.user.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Not enough permissions"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn read_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<UserResponse> {
    ensure_self_or_superuser(&current, id)?;
    let user = state.user_service.get(id).await?;
    ok("User retrieved successfully", user.into())
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Not enough permissions"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserResponse> {
    ensure_self_or_superuser(&current, id)?;
    payload.validate()?;

    if payload.is_active.is_some() && !current.is_superuser() {
        return Err(AppError::Forbidden(
            "Only superusers can change account activation".to_string(),
        ));
    }

    let user = state
        .user_service
        .update(
            id,
            UserChanges {
                full_name: payload.full_name,
                password: payload.password,
                is_active: payload.is_active,
            },
        )
        .await?;

    ok("User updated successfully", user.into())
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Not enough permissions"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> ApiResult<()> {
    ensure_self_or_superuser(&current, id)?;
    state.user_service.delete(id).await?;
    ok("User deleted successfully", ())
}
