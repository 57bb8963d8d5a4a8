use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Enumerated Domain Values ---

/// Category
///
/// The fixed set of collections a PDF can be filed under. Stored as its name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
pub enum Category {
    Educational,
    Religious,
    Medical,
    Literature,
    Science,
    Technology,
    History,
    Philosophy,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Educational,
        Category::Religious,
        Category::Medical,
        Category::Literature,
        Category::Science,
        Category::Technology,
        Category::History,
        Category::Philosophy,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Educational => "Educational",
            Category::Religious => "Religious",
            Category::Medical => "Medical",
            Category::Literature => "Literature",
            Category::Science => "Science",
            Category::Technology => "Technology",
            Category::History => "History",
            Category::Philosophy => "Philosophy",
            Category::Other => "Other",
        }
    }

    /// Exact, case-sensitive name lookup.
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Upload-form semantics: anything missing or unknown is filed under `Other`.
    pub fn parse_or_default(name: Option<&str>) -> Category {
        name.map(str::trim)
            .and_then(Category::from_name)
            .unwrap_or_default()
    }

    pub fn names() -> Vec<String> {
        Category::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }
}

/// Priority of a support ticket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Priority> {
        match raw.trim() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Lifecycle state of a support ticket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum TicketStatus {
    #[default]
    Open,
    Resolved,
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Option<TicketStatus> {
        match raw.trim() {
            "open" => Some(TicketStatus::Open),
            "resolved" => Some(TicketStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Resolved => "resolved",
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table. The credential hash is loaded for
/// login verification but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    #[ts(type = "string")]
    pub join_date: DateTime<Utc>,
    pub is_admin: bool,
    pub is_active: bool,
    pub uploads_count: i64,
    pub downloads_count: i64,
}

/// FileRecord
///
/// A row of `files` joined with the uploader's username. Internal shape; the API
/// returns [`FileResponse`].
#[derive(Debug, Clone, FromRow, Default)]
pub struct FileRecord {
    pub id: i64,
    // Generated storage name, unique across all files.
    pub filename: String,
    pub original_name: String,
    pub filepath: String,
    pub size_mb: f64,
    pub category: Category,
    pub description: String,
    // Comma-separated, as typed by the uploader.
    pub tags: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub download_count: i64,
    pub user_id: i64,
    pub is_featured: bool,
    // Loaded via a JOIN on `users`.
    pub uploaded_by: String,
}

/// SupportTicket
///
/// A row of `support_tickets` joined with the owner's username and email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct SupportTicket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    #[ts(type = "string")]
    pub created_date: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub resolved_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub user_id: i64,
    pub admin_response: Option<String>,
    // Owner username, sent as "user" for API compatibility.
    #[serde(rename = "user")]
    pub owner_username: String,
    // Used for notifications only.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub owner_email: String,
}

/// Invitation
///
/// Single-use registration code bound to one email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Invitation {
    pub id: i64,
    pub email: String,
    pub invite_code: String,
    pub invited_by: String,
    pub message: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub used: bool,
    #[ts(type = "string | null")]
    pub used_at: Option<DateTime<Utc>>,
}

// --- Insert Shapes (Repository Input) ---

/// NewUser
///
/// Validated registration data; `password_hash` is already derived.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// NewFile
///
/// Metadata for a blob that has already been written by the storage layer.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub original_name: String,
    pub filepath: String,
    pub size_mb: f64,
    pub category: Category,
    pub description: String,
    pub tags: Option<String>,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub invite_code: String,
    pub invited_by: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub user_id: i64,
}

/// FileFilter
///
/// Normalized listing criteria. `None` means "no restriction".
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured_only: bool,
}

/// Registration
///
/// Outcome of the registration transaction.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub invitation_consumed: bool,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub invite_code: Option<String>,
}

/// LoginRequest
///
/// `username` accepts either the username or the email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default, alias = "identifier", alias = "email")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InviteRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RespondTicketRequest {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// UploadForm
///
/// Multipart upload form, for OpenAPI documentation only. The handler reads the
/// fields with axum's `Multipart` extractor.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The PDF document.
    #[schema(format = Binary, content_media_type = "application/pdf")]
    pub pdf: String,
    #[schema(example = "Science")]
    pub category: Option<String>,
    pub description: Option<String>,
    /// Comma-separated tags.
    #[schema(example = "physics,notes")]
    pub tags: Option<String>,
}

// --- Response Schemas (Output) ---

/// FileResponse
///
/// Public representation of a file. Tags are exploded into a list and the on-disk path
/// is withheld.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FileResponse {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub size_mb: f64,
    pub category: Category,
    pub description: String,
    #[ts(type = "string")]
    pub upload_date: DateTime<Utc>,
    pub download_count: i64,
    pub uploaded_by: String,
    pub uploader_id: i64,
    pub is_featured: bool,
    pub tags: Vec<String>,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        let tags = record
            .tags
            .as_deref()
            .map(split_tags)
            .unwrap_or_default();
        Self {
            id: record.id,
            filename: record.filename,
            original_name: record.original_name,
            size_mb: record.size_mb,
            category: record.category,
            description: record.description,
            upload_date: record.upload_date,
            download_count: record.download_count,
            uploaded_by: record.uploaded_by,
            uploader_id: record.user_id,
            is_featured: record.is_featured,
            tags,
        }
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub invitation_accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserInfoResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub original_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InviteResponse {
    pub message: String,
    pub invite_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TicketResponse {
    pub message: String,
    pub ticket: SupportTicket,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TicketListResponse {
    pub tickets: Vec<SupportTicket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserStatusResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FeaturedResponse {
    pub message: String,
    pub file: FileResponse,
}

// --- Analytics Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct AnalyticsStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_files: i64,
    pub total_downloads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Analytics
///
/// Read-only dashboard aggregate for administrators (GET /analytics).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Analytics {
    pub stats: AnalyticsStats,
    pub categories: Vec<CategoryCount>,
    pub recent_uploads: Vec<FileResponse>,
}
