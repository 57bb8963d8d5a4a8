use crate::{
    AppState,
    auth::{AuthUser, Capability},
    error::{AppError, ErrorBody, Result},
    extract::AppJson,
    handlers::non_empty,
    models::{
        CreateTicketRequest, NewTicket, Priority, RespondTicketRequest, TicketListResponse,
        TicketResponse, TicketStatus,
    },
    notifier::{new_ticket_email, notify_best_effort, ticket_update_email},
};
use axum::{
    Json,
    extract::{Path, State},
};

/// create_ticket
///
/// [Authenticated Route] Opens a support ticket and lets the administrator know.
#[utoipa::path(
    post,
    path = "/support/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 200, description = "Ticket created", body = TicketResponse),
        (status = 400, description = "Missing field or unknown priority", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody)
    ),
    tag = "support"
)]
pub async fn create_ticket(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTicketRequest>,
) -> Result<Json<TicketResponse>> {
    let title = payload.title.trim().to_string();
    let description = payload.description.trim().to_string();
    if title.is_empty() || description.is_empty() {
        return Err(AppError::BadRequest(
            "Title and description are required".to_string(),
        ));
    }

    let priority = match non_empty(payload.priority) {
        None => Priority::default(),
        Some(raw) => Priority::parse(&raw)
            .ok_or_else(|| AppError::BadRequest("Invalid priority".to_string()))?,
    };

    let ticket = state
        .repo
        .create_ticket(NewTicket {
            title,
            description,
            priority,
            user_id: user.id,
        })
        .await?;

    tracing::info!(ticket_id = ticket.id, user_id = user.id, "Support ticket created");

    notify_best_effort(
        &state.notifier,
        new_ticket_email(&state.config.admin_email, &ticket),
    )
    .await;

    Ok(Json(TicketResponse {
        message: "Support ticket created successfully".to_string(),
        ticket,
    }))
}

/// list_tickets
///
/// [Authenticated Route] Admins see every ticket, everyone else only their own.
#[utoipa::path(
    get,
    path = "/support/tickets",
    responses(
        (status = 200, description = "Tickets, newest first", body = TicketListResponse),
        (status = 401, description = "Not logged in", body = ErrorBody)
    ),
    tag = "support"
)]
pub async fn list_tickets(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TicketListResponse>> {
    let owner = (!user.is_admin).then_some(user.id);
    let tickets = state.repo.list_tickets(owner).await?;
    Ok(Json(TicketListResponse { tickets }))
}

/// respond_to_ticket
///
/// [Admin Route] Records the admin's answer, sets the status and notifies the owner.
#[utoipa::path(
    post,
    path = "/admin/tickets/{id}/respond",
    params(("id" = i64, Path, description = "Ticket id")),
    request_body = RespondTicketRequest,
    responses(
        (status = 200, description = "Response stored", body = TicketResponse),
        (status = 400, description = "Missing response or unknown status", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Unknown ticket", body = ErrorBody)
    ),
    tag = "admin"
)]
pub async fn respond_to_ticket(
    admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<RespondTicketRequest>,
) -> Result<Json<TicketResponse>> {
    admin.authorize(Capability::Admin, None)?;

    let Some(response) = non_empty(Some(payload.response)) else {
        return Err(AppError::BadRequest("Response is required".to_string()));
    };
    let status = match non_empty(payload.status) {
        None => TicketStatus::default(),
        Some(raw) => TicketStatus::parse(&raw)
            .ok_or_else(|| AppError::BadRequest("Invalid status".to_string()))?,
    };

    let ticket = state
        .repo
        .respond_to_ticket(id, response, status)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    tracing::info!(
        ticket_id = ticket.id,
        status = ticket.status.as_str(),
        admin = %admin.username,
        "Support ticket answered"
    );

    notify_best_effort(&state.notifier, ticket_update_email(&ticket)).await;

    Ok(Json(TicketResponse {
        message: "Response sent successfully".to_string(),
        ticket,
    }))
}
