use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, Result},
    repository::RepositoryState,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "edulibrary_session";

type HmacSha256 = Hmac<Sha256>;

// --- Credentials ---

/// hash_password
///
/// bcrypt is deliberately slow, so hashing runs on the blocking pool instead of
/// stalling the async worker.
pub async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("bcrypt hash failed: {}", e)))
}

/// Returns false for a wrong password and for a malformed stored hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {}", e)))?;

    match outcome {
        Ok(valid) => Ok(valid),
        Err(e) => {
            tracing::warn!("Stored credential hash could not be parsed: {}", e);
            Ok(false)
        }
    }
}

// --- Sessions ---

/// Session
///
/// Server-side record a session token points at.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// SessionStore
///
/// Keyed by the session id embedded in the signed token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<Session>;
    async fn set(&self, session_id: String, session: Session);
    /// Removing an unknown id is a no-op.
    async fn clear(&self, session_id: &str);
}

pub type SessionState = Arc<dyn SessionStore>;

/// In-process store. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn set(&self, session_id: String, session: Session) {
        self.sessions.write().await.insert(session_id, session);
    }

    async fn clear(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

// --- Tokens & Cookies ---

fn session_mac(secret: &str, session_id: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid session key: {}", e)))?;
    mac.update(session_id.as_bytes());
    Ok(mac)
}

/// sign_session_id
///
/// Produces the wire token `<session-id>.<hex hmac-sha256>`.
pub fn sign_session_id(secret: &str, session_id: &str) -> Result<String> {
    let signature = session_mac(secret, session_id)?.finalize().into_bytes();
    Ok(format!("{}.{}", session_id, hex::encode(signature)))
}

/// verify_session_token
///
/// Returns the embedded session id when the signature checks out. The comparison is
/// constant-time.
pub fn verify_session_token(secret: &str, token: &str) -> Option<String> {
    let (session_id, signature) = token.rsplit_once('.')?;
    if session_id.is_empty() {
        return None;
    }
    let signature = hex::decode(signature).ok()?;
    session_mac(secret, session_id)
        .ok()?
        .verify_slice(&signature)
        .ok()?;
    Some(session_id.to_string())
}

/// session_token_from_headers
///
/// The cookie wins over an `Authorization: Bearer` header when both are present.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

pub fn session_cookie(token: &str, env: &Env) -> String {
    let mut cookie = format!("{}={}; HttpOnly; Path=/; SameSite=Lax", SESSION_COOKIE, token);
    if *env == Env::Production {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

/// start_session
///
/// Records a fresh session for the user and returns the signed token to hand out.
pub async fn start_session(
    sessions: &SessionState,
    secret: &str,
    user_id: i64,
    username: &str,
    is_admin: bool,
) -> Result<String> {
    let session_id = Uuid::new_v4().to_string();
    let token = sign_session_id(secret, &session_id)?;
    sessions
        .set(
            session_id,
            Session {
                user_id,
                username: username.to_string(),
                is_admin,
                created_at: Utc::now(),
            },
        )
        .await;
    Ok(token)
}

// --- Identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Name and admin flag are re-read
/// from the database on every request, so a promotion or rename takes effect without
/// a new login.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub session_id: String,
}

/// Capability
///
/// A privilege a handler needs before touching a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Admin,
    OwnerOrAdmin { owner_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny(String),
}

impl AuthUser {
    pub fn can(&self, capability: Capability) -> Access {
        match capability {
            Capability::Admin if self.is_admin => Access::Allow,
            Capability::Admin => Access::Deny("Admin access required".to_string()),
            Capability::OwnerOrAdmin { owner_id } if self.is_admin || self.id == owner_id => {
                Access::Allow
            }
            Capability::OwnerOrAdmin { .. } => {
                Access::Deny("You do not have access to this resource".to_string())
            }
        }
    }

    /// Like [`AuthUser::can`], but a denial becomes a 403 carrying `reason` when given.
    pub fn authorize(&self, capability: Capability, reason: Option<&str>) -> Result<()> {
        match self.can(capability) {
            Access::Allow => Ok(()),
            Access::Deny(default) => Err(AppError::Forbidden(
                reason.map(str::to_string).unwrap_or(default),
            )),
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Resolves the request's session token into an `AuthUser`. The token must carry a
/// valid signature, reference a live session and point at a user that still exists;
/// a session whose user has been deleted is dropped.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let config = AppConfig::from_ref(state);

        let token = session_token_from_headers(&parts.headers).ok_or_else(AppError::unauthenticated)?;
        let session_id = verify_session_token(&config.secret_key, &token)
            .ok_or_else(AppError::unauthenticated)?;

        let sessions = SessionState::from_ref(state);
        let session = sessions
            .get(&session_id)
            .await
            .ok_or_else(AppError::unauthenticated)?;

        let repo = RepositoryState::from_ref(state);
        let Some(user) = repo.get_user(session.user_id).await? else {
            tracing::info!(user_id = session.user_id, "Dropping session of deleted user");
            sessions.clear(&session_id).await;
            return Err(AppError::unauthenticated());
        };

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            session_id,
        })
    }
}

/// `Option<AuthUser>` for public routes that only want to know who is asking.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Option<Self>> {
        match <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(AppError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
