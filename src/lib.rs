use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
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

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod roles;
pub mod storage;

// Routing, segregated by access tier (public, authenticated, privileged).
pub mod routes;
use auth::AuthUser;
use handlers::{clubs, comments, events, users};
use routes::{authenticated, privileged, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// The OpenAPI document, assembled from the `#[utoipa::path]` annotations on the
/// handlers and served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        users::create_user, users::register_user, users::login_user, users::logout_user,
        users::get_me, users::list_users, users::assign_role, users::remove_role,
        clubs::create_club, clubs::list_clubs, clubs::get_club, clubs::update_club,
        clubs::delete_club, clubs::join_club, clubs::club_leaders, clubs::club_members,
        events::list_events, events::get_event, events::create_event, events::update_event,
        events::delete_event, events::approve_event, events::reject_event,
        events::like_event, events::unlike_event, events::svp_event, events::attendance,
        comments::add_comment, comments::delete_comment, comments::list_comments
    ),
    components(
        schemas(
            roles::Role, models::User, models::UserSummary, models::RegisterUserRequest,
            models::LoginRequest, models::AuthResponse, models::RoleChangeRequest,
            models::RoleChangeResponse, models::MessageResponse, models::Club,
            models::ClubDetails, clubs::ClubForm, models::EventStatus, models::Event,
            models::CreateEventRequest, models::UpdateEventRequest, events::EventForm,
            models::EventReviewResponse, models::AttendanceList, models::Comment,
            models::CreateCommentRequest,
        )
    ),
    tags(
        (name = "users", description = "Registration, sessions and role management"),
        (name = "clubs", description = "Club directory and membership"),
        (name = "events", description = "Event proposals, review and engagement"),
        (name = "comments", description = "Event comment threads")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared state of the service. Cheap to clone: every component is behind
/// an `Arc` or is plain configuration.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory for local runs and tests.
    pub repo: RepositoryState,
    /// Picture uploads.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Implementations ---

// Let extractors (notably `AuthUser`) pull single components out of `AppState`.

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

/// auth_middleware
///
/// Guards the authenticated and privileged tiers. Extracting `AuthUser` validates the
/// token and loads the user; on failure the extractor's 401 is returned and the
/// handler never runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree under `/api`, the static upload directory, the
/// documentation and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = authenticated::authenticated_routes()
        .merge(privileged::privileged_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .merge(public::public_routes())
        .merge(protected);

    let uploads = ServeDir::new(&state.config.upload_dir);
    let body_limit = state.config.max_upload_bytes;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health: liveness check.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        // Stored picture references (`uploads/...`) double as their URL path.
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
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
/// Opens the per-request span with method, URI and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
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
