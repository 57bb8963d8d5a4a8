use crate::{
    AppState,
    auth::{
        self, AuthUser, expired_session_cookie, hash_password, session_cookie,
        session_token_from_headers, verify_password, verify_session_token,
    },
    error::{AppError, ErrorBody, Result},
    extract::AppJson,
    models::{
        LoginRequest, LoginResponse, MessageResponse, NewUser, RegisterRequest, RegisterResponse,
        UserInfoResponse,
    },
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};

/// register
///
/// [Public Route] Creates a regular account. When an invite code is supplied it is
/// consumed in the same transaction as the user insert; a code that does not match
/// the email (or was already used) does not fail the registration.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing field or duplicate username/email", body = ErrorBody)
    ),
    tag = "account"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    if username.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }
    if state.repo.username_exists(&username).await? {
        return Err(AppError::BadRequest("Username already exists".to_string()));
    }
    if state.repo.email_exists(&email).await? {
        return Err(AppError::BadRequest("Email already exists".to_string()));
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;

    let registration = state
        .repo
        .create_user(
            NewUser {
                username,
                email,
                password_hash,
                is_admin: false,
            },
            payload.invite_code,
        )
        .await?;

    tracing::info!(
        user_id = registration.user.id,
        username = %registration.user.username,
        invitation_accepted = registration.invitation_consumed,
        "User registered"
    );

    Ok(Json(RegisterResponse {
        message: "Registration successful".to_string(),
        invitation_accepted: registration.invitation_consumed,
    }))
}

/// login
///
/// [Public Route] Verifies the credential and opens a session. Unknown user, wrong
/// password and deactivated account all produce the same 401.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = LoginResponse),
        (status = 400, description = "Missing field", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "account"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let identifier = payload.username.trim();
    if identifier.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .repo
        .find_user_by_login(identifier)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::info!(username = %user.username, "Login rejected: wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        tracing::info!(username = %user.username, "Login rejected: account deactivated");
        return Err(invalid());
    }

    let token = auth::start_session(
        &state.sessions,
        &state.config.secret_key,
        user.id,
        &user.username,
        user.is_admin,
    )
    .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, &state.config.env))],
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

/// logout
///
/// [Public Route] Idempotent: succeeds with or without a live session.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Session cleared", body = MessageResponse)),
    tag = "account"
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session_id) = session_token_from_headers(&headers)
        .and_then(|token| verify_session_token(&state.config.secret_key, &token))
    {
        state.sessions.clear(&session_id).await;
        tracing::debug!("Session cleared");
    }

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// user_info
///
/// [Public Route] Reports whether the caller holds a valid session and, if so, who
/// they are.
#[utoipa::path(
    get,
    path = "/user-info",
    responses((status = 200, description = "Session status", body = UserInfoResponse)),
    tag = "account"
)]
pub async fn user_info(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<UserInfoResponse>> {
    let user = match user {
        Some(auth_user) => state.repo.get_user(auth_user.id).await?,
        None => None,
    };

    Ok(Json(UserInfoResponse {
        logged_in: user.is_some(),
        user,
    }))
}
