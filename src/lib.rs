pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::provider::ScanProvider;
use crate::services::scan_service::ScanService;
use crate::services::scan_store::ScanStore;
use crate::services::user_service::UserService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health_check,
        api::handlers::auth::login_for_access_token,
        api::handlers::auth::logout,
        api::handlers::users::create_user,
        api::handlers::users::read_current_user,
        api::handlers::users::read_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::scans::upload_file,
        api::handlers::scans::list_scans,
        api::handlers::scans::get_scan,
        api::handlers::scans::get_scan_by_hash,
        api::handlers::scans::mark_scan_error,
    ),
    components(
        schemas(
            api::response::ResponseStatus,
            api::handlers::health::ServiceInfo,
            api::handlers::health::HealthResponse,
            api::handlers::auth::LoginForm,
            api::handlers::auth::TokenResponse,
            api::handlers::users::CreateUserRequest,
            api::handlers::users::UpdateUserRequest,
            api::handlers::users::UserResponse,
            api::handlers::scans::ScanResponse,
            api::handlers::scans::MarkErrorRequest,
            entities::file_scans::ScanStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Liveness and health"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management endpoints"),
        (name = "scans", description = "Malware scan endpoints")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub provider: Arc<dyn ScanProvider>,
    pub scan_service: Arc<ScanService>,
    pub user_service: UserService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, provider: Arc<dyn ScanProvider>, config: AppConfig) -> Self {
        let scan_service = Arc::new(ScanService::new(
            ScanStore::new(db.clone()),
            provider.clone(),
            config.clone(),
        ));

        Self {
            user_service: UserService::new(db.clone()),
            db,
            provider,
            scan_service,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let auth = || from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware);

    let users = Router::new()
        .route("/users/me", get(api::handlers::users::read_current_user))
        .route(
            "/users/:id",
            get(api::handlers::users::read_user)
                .put(api::handlers::users::update_user)
                .delete(api::handlers::users::delete_user),
        )
        .route("/auth/logout", post(api::handlers::auth::logout))
        .route_layer(auth());

    let scans = Router::new()
        .route(
            "/scans/upload",
            post(api::handlers::scans::upload_file).layer(axum::extract::DefaultBodyLimit::max(
                // 10MB buffer for multipart overhead
                state
                    .config
                    .max_file_size_bytes()
                    .saturating_add(10 * 1024 * 1024),
            )),
        )
        .route("/scans", get(api::handlers::scans::list_scans))
        .route("/scans/hash/:hash", get(api::handlers::scans::get_scan_by_hash))
        .route("/scans/:id", get(api::handlers::scans::get_scan))
        .route(
            "/scans/:id/error",
            post(api::handlers::scans::mark_scan_error),
        )
        .route_layer(auth());

    let public = Router::new()
        .route("/users", post(api::handlers::users::create_user))
        .route(
            "/auth/token",
            post(api::handlers::auth::login_for_access_token),
        );

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .nest("/api/v1", public.merge(users).merge(scans))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
