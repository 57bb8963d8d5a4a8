use crate::{
    AppState,
    handlers::{files, invites, support},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Routes for any logged-in user. The router is wrapped in `auth_middleware`, and the
/// handlers take `AuthUser` themselves for ownership checks.
///
/// `max_upload_bytes` caps the multipart body of `/upload`; larger requests get a 413.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // POST /upload (multipart: pdf, category, description, tags)
        .route(
            "/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        // GET /download/{id}
        // Any authenticated user may download; counters are bumped per download.
        .route("/download/{id}", get(files::download_file))
        // DELETE /delete/{id}
        // Owner or admin only, enforced in the handler.
        .route("/delete/{id}", delete(files::delete_file))
        .route("/send-invite", post(invites::send_invite))
        // GET lists own tickets (all for admins); POST opens one.
        .route(
            "/support/tickets",
            get(support::list_tickets).post(support::create_ticket),
        )
}
