use crate::AppState;
use crate::api::error::AppError;
use crate::entities::users;
use crate::utils::auth::validate_jwt;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// The authenticated account, available to handlers as `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: users::Model,
    pub access_token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn is_superuser(&self) -> bool {
        self.user.is_superuser
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::Unauthorized("Could not validate credentials".to_string());

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    let token = token.ok_or_else(unauthorized)?;
    let claims = validate_jwt(&token, &state.config.jwt_secret).map_err(|_| unauthorized())?;

    // The JWT alone is not enough: the stored token must still be valid.
    let user = state
        .user_service
        .user_for_token(&token)
        .await?
        .filter(|u| claims.user_id().ok() == Some(u.id))
        .ok_or_else(unauthorized)?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(CurrentUser {
        user,
        access_token: token,
    });
    Ok(next.run(req).await)
}
