use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod storage;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::{AuthUser, Capability};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{InMemorySessionStore, SessionState};
pub use config::AppConfig;
pub use error::AppError;
pub use notifier::{LogMailer, MockNotifier, NotifierState};
pub use repository::{RepositoryState, SqliteRepository};
pub use storage::{LocalStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and `ToSchema`
/// payloads. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::account::register, handlers::account::login, handlers::account::logout,
        handlers::account::user_info,
        handlers::files::upload_file, handlers::files::list_files, handlers::files::download_file,
        handlers::files::preview_file, handlers::files::delete_file,
        handlers::invites::send_invite,
        handlers::support::create_ticket, handlers::support::list_tickets,
        handlers::support::respond_to_ticket,
        handlers::admin::list_users, handlers::admin::toggle_user_status,
        handlers::admin::toggle_featured, handlers::admin::get_analytics,
    ),
    components(
        schemas(
            models::User, models::Category, models::Priority, models::TicketStatus,
            models::FileResponse, models::SupportTicket, models::Invitation,
            models::RegisterRequest, models::LoginRequest, models::InviteRequest,
            models::CreateTicketRequest, models::RespondTicketRequest, models::UploadForm,
            models::MessageResponse, models::RegisterResponse, models::LoginResponse,
            models::UserInfoResponse, models::UploadResponse, models::FileListResponse,
            models::InviteResponse, models::TicketResponse, models::TicketListResponse,
            models::UserListResponse, models::UserStatusResponse, models::FeaturedResponse,
            models::AnalyticsStats, models::CategoryCount, models::Analytics,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "account", description = "Registration, login and session status"),
        (name = "files", description = "PDF upload, listing, download and removal"),
        (name = "invites", description = "Email invitations"),
        (name = "support", description = "Support tickets"),
        (name = "admin", description = "Moderation and analytics")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration. Handlers pull the
/// parts they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Entity store (SQLite in production).
    pub repo: RepositoryState,
    /// Blob store for the PDF bytes.
    pub storage: StorageState,
    /// Server-side sessions referenced by the signed session token.
    pub sessions: SessionState,
    /// Outbound email.
    pub notifier: NotifierState,
    pub config: AppConfig,
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

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for NotifierState {
    fn from_ref(app_state: &AppState) -> NotifierState {
        app_state.notifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for `authenticated_routes`. Extracting `AuthUser` is the whole check: a
/// missing or invalid session is rejected with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Gate for `admin_routes`: 401 without a session, then 403 unless the session's
/// user holds the admin capability.
async fn admin_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.authorize(Capability::Admin, None)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routing tree, applies the scoped access layers and the global
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes(state.config.max_upload_bytes).route_layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    // Observability and correlation layers, outermost.
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
/// Builds the per-request span so every log line of one request carries the same
/// `req_id`.
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
