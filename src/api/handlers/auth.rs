use crate::AppState;
use crate::api::middleware::auth::CurrentUser;
use crate::api::response::{ApiResult, ok};
use axum::{Extension, Form, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    /// Account email
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Incorrect email or password")
    ),
    tag = "auth"
)]
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<TokenResponse> {
    let user = state
        .user_service
        .authenticate(&form.email, &form.password)
        .await?;

    let issued = state
        .user_service
        .issue_token(
            &user,
            &state.config.jwt_secret,
            state.config.access_token_expire_minutes,
        )
        .await?;

    tracing::info!("🔑 Issued access token for user {}", user.id);

    ok(
        "Login successful",
        TokenResponse {
            access_token: issued.token,
            token_type: "bearer".to_string(),
            expires_at: issued.expires_at,
        },
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Token revoked"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<()> {
    state.user_service.revoke_token(&current.access_token).await?;
    ok("Successfully logged out", ())
}
