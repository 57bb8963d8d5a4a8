use crate::{
    AppState,
    handlers::{admin, support},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Moderation and oversight endpoints. `create_router` wraps this router in
/// `admin_middleware`, which answers 401 without a session and 403 for non-admins
/// before any handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users/{id}/toggle-status",
            post(admin::toggle_user_status),
        )
        .route("/admin/files/featured/{id}", post(admin::toggle_featured))
        .route(
            "/admin/tickets/{id}/respond",
            post(support::respond_to_ticket),
        )
        // GET /analytics
        // Dashboard totals; lives outside /admin for client compatibility.
        .route("/analytics", get(admin::get_analytics))
}
