use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody, Result},
    extract::AppJson,
    handlers::non_empty,
    models::{InviteRequest, InviteResponse, NewInvitation},
    notifier::{invitation_email, notify_best_effort},
};
use axum::{Json, extract::State};
use rand::Rng;

/// generate_invite_code
///
/// 16 random bytes, hex encoded (32 characters).
pub fn generate_invite_code() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Link the invitee follows to reach the registration form pre-filled.
pub fn invite_link(public_url: &str, code: &str, email: &str) -> String {
    format!(
        "{}/?invite={}&email={}",
        public_url.trim_end_matches('/'),
        code,
        urlencoding::encode(email)
    )
}

/// send_invite
///
/// [Authenticated Route] Records an invitation and emails the link. The invitation is
/// valid once stored, so a mail failure only changes the message.
#[utoipa::path(
    post,
    path = "/send-invite",
    request_body = InviteRequest,
    responses(
        (status = 200, description = "Invitation stored", body = InviteResponse),
        (status = 400, description = "Missing email", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody)
    ),
    tag = "invites"
)]
pub async fn send_invite(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<InviteRequest>,
) -> Result<Json<InviteResponse>> {
    let email = payload.email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }
    let message = non_empty(payload.message);

    let invitation = state
        .repo
        .create_invitation(NewInvitation {
            email,
            invite_code: generate_invite_code(),
            invited_by: user.username.clone(),
            message,
        })
        .await?;

    let link = invite_link(
        &state.config.public_url,
        &invitation.invite_code,
        &invitation.email,
    );

    let delivered = notify_best_effort(
        &state.notifier,
        invitation_email(
            &invitation.email,
            &user.username,
            &link,
            invitation.message.as_deref(),
        ),
    )
    .await;

    tracing::info!(
        invitation_id = invitation.id,
        invited_by = %user.username,
        delivered,
        "Invitation created"
    );

    let message = if delivered {
        "Invitation sent successfully!"
    } else {
        "Invitation created but email could not be sent. Check email configuration."
    };

    Ok(Json(InviteResponse {
        message: message.to_string(),
        invite_link: link,
    }))
}
