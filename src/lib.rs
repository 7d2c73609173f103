use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::Next,
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Routing segregated by access level (Public, Admin).
pub mod routes;
use auth::AdminPrincipal;
use routes::{admin, public};

// --- Public Re-exports ---

pub use auth::CredentialService;
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from every `#[utoipa::path]` handler and `ToSchema`
/// model. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::list_categories, handlers::list_menu_items,
        handlers::create_reservation, handlers::create_contact, handlers::list_banners,
        handlers::admin_login, handlers::upload_image,
        handlers::admin_list_categories, handlers::admin_get_category,
        handlers::admin_create_category, handlers::admin_update_category,
        handlers::admin_delete_category,
        handlers::admin_list_menu_items, handlers::admin_get_menu_item,
        handlers::admin_create_menu_item, handlers::admin_update_menu_item,
        handlers::admin_delete_menu_item,
        handlers::admin_list_banners, handlers::admin_get_banner,
        handlers::admin_create_banner, handlers::admin_update_banner,
        handlers::admin_delete_banner,
        handlers::admin_list_reservations
    ),
    components(
        schemas(
            models::Category, models::CategoryCreate, models::CategoryUpdate,
            models::MenuItem, models::MenuItemCreate, models::MenuItemUpdate,
            models::Banner, models::BannerCreate, models::BannerUpdate,
            models::Reservation, models::ReservationCreate, models::ReservationResponse,
            models::ReservationStatus, models::ContactCreate, models::ContactResponse,
            models::AdminLogin, models::Token, models::UploadResponse, models::DeleteResponse,
            models::HealthResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "keny-cafe", description = "Café menu, bookings and admin API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of every service a handler may need. Shared
/// across all requests; nothing in it is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: all entity persistence.
    pub repo: RepositoryState,
    /// Storage Layer: where uploaded images are written.
    pub storage: StorageState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Credential Service: password checks and bearer tokens.
    pub credentials: CredentialService,
}

impl AppState {
    /// Builds the state, deriving the credential service from the configuration.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let credentials = CredentialService::from_config(&config);
        Self {
            repo,
            storage,
            config,
            credentials,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for CredentialService {
    fn from_ref(app_state: &AppState) -> CredentialService {
        app_state.credentials.clone()
    }
}

/// require_admin
///
/// The access gate for every admin route except login. Resolving `AdminPrincipal`
/// verifies the bearer token; on failure the extractor's 401 is returned and the
/// handler never runs. On success the principal is stored in the request extensions
/// for the handlers downstream.
pub async fn require_admin(admin: AdminPrincipal, mut request: Request, next: Next) -> Response {
    tracing::debug!(admin = %admin.username, "admin request authorized");
    request.extensions_mut().insert(admin);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global middleware and registers the state.
/// API routes live under `/api`; uploaded images are served from `/uploads`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .nest("/admin", admin::admin_routes(state.clone()));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .nest_service(
            storage::UPLOADS_URL_PREFIX,
            ServeDir::new(&state.config.uploads_dir),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens one `http_request` span per request carrying the method, URI and the
/// `x-request-id`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
