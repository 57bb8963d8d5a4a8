use crate::{AppState, handlers::{account, files}};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the account gateway, the catalogue listing
/// and inline previews.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        // Idempotent, so it does not require a session.
        .route("/logout", post(account::logout))
        .route("/user-info", get(account::user_info))
        // GET /files?category=...&search=...&featured=true
        .route("/files", get(files::list_files))
        .route("/preview/{id}", get(files::preview_file))
}
