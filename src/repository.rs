use crate::error::{AppError, Result};
use crate::models::{
    Analytics, AnalyticsStats, CategoryCount, FileFilter, FileRecord, FileResponse, Invitation,
    NewFile, NewInvitation, NewTicket, NewUser, Registration, SupportTicket, TicketStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Repository Trait
///
/// Abstract contract for every persistence operation. Handlers depend on this trait
/// only, so the SQLite implementation can be swapped out in tests.
///
/// Multi-statement writes (registration, upload, download, delete) are single methods
/// here so each one runs inside exactly one store transaction.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Looks a user up by username OR email.
    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>>;
    async fn username_exists(&self, username: &str) -> Result<bool>;
    async fn email_exists(&self, email: &str) -> Result<bool>;
    /// Inserts the user and, when a code is given, consumes the matching invitation in
    /// the same transaction.
    async fn create_user(&self, user: NewUser, invite_code: Option<String>)
    -> Result<Registration>;
    /// Creates `admin` only when no admin account exists yet. Returns true if created.
    async fn ensure_bootstrap_admin(&self, admin: NewUser) -> Result<bool>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Flips `is_active` on a non-admin account. `None` if no such non-admin user.
    async fn toggle_user_active(&self, id: i64) -> Result<Option<User>>;

    // --- Files ---
    /// Inserts the file record and bumps the uploader's counter atomically.
    async fn create_file(&self, file: NewFile) -> Result<FileRecord>;
    async fn get_file(&self, id: i64) -> Result<Option<FileRecord>>;
    async fn list_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>>;
    /// Increments the file's and the downloader's counters. False if the file is gone.
    async fn record_download(&self, file_id: i64, user_id: i64) -> Result<bool>;
    /// Deletes the record and decrements the owner's counter (floored at zero).
    async fn delete_file(&self, id: i64) -> Result<bool>;
    async fn toggle_featured(&self, id: i64) -> Result<Option<FileRecord>>;

    // --- Invitations ---
    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation>;
    async fn get_invitation(&self, code: &str) -> Result<Option<Invitation>>;
    /// Atomic check-and-consume. True only for the call that flipped `used`.
    async fn consume_invitation(&self, code: &str, email: &str) -> Result<bool>;

    // --- Support Tickets ---
    async fn create_ticket(&self, ticket: NewTicket) -> Result<SupportTicket>;
    async fn get_ticket(&self, id: i64) -> Result<Option<SupportTicket>>;
    /// All tickets when `owner` is `None`, otherwise only that user's.
    async fn list_tickets(&self, owner: Option<i64>) -> Result<Vec<SupportTicket>>;
    async fn respond_to_ticket(
        &self,
        id: i64,
        response: String,
        status: TicketStatus,
    ) -> Result<Option<SupportTicket>>;

    // --- Analytics ---
    async fn get_analytics(&self, recent_limit: i64) -> Result<Analytics>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, email, password_hash, join_date, is_admin, is_active, uploads_count, downloads_count";

const FILE_SELECT: &str = r#"
    SELECT f.id, f.filename, f.original_name, f.filepath, f.size_mb, f.category,
           f.description, f.tags, f.upload_date, f.download_count, f.user_id,
           f.is_featured, u.username AS uploaded_by
    FROM files f
    JOIN users u ON u.id = f.user_id
"#;

const TICKET_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.priority, t.status, t.created_date,
           t.resolved_date, t.user_id, t.admin_response,
           u.username AS owner_username, u.email AS owner_email
    FROM support_tickets t
    JOIN users u ON u.id = t.user_id
"#;

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("migration failed: {}", e)))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// consume_invitation_on
///
/// The conditional update behind invitation consumption. Shared by the standalone
/// operation and the registration transaction.
async fn consume_invitation_on(
    conn: &mut SqliteConnection,
    code: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE invitations SET used = 1, used_at = ? WHERE invite_code = ? AND email = ? AND used = 0",
    )
    .bind(now)
    .bind(code)
    .bind(email)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Turns a UNIQUE constraint hit on `users` into the same 400 the pre-checks produce.
fn map_user_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::BadRequest("Username or email already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

/// Escapes LIKE wildcards so search text matches literally (used with `ESCAPE '\'`).
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1 ORDER BY username = ?1 DESC LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// create_user
    ///
    /// The user insert and the invitation update commit or roll back together, and the
    /// invitation update is conditional on `used = 0`, so two registrations racing on
    /// one code cannot both consume it.
    async fn create_user(
        &self,
        user: NewUser,
        invite_code: Option<String>,
    ) -> Result<Registration> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, join_date, is_admin, is_active) \
             VALUES (?, ?, ?, ?, ?, 1) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now)
        .bind(user.is_admin)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_user_conflict)?;

        let invitation_consumed = match invite_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                consume_invitation_on(&mut tx, code, &created.email, now).await?
            }
            _ => false,
        };

        tx.commit().await?;

        Ok(Registration {
            user: created,
            invitation_consumed,
        })
    }

    async fn ensure_bootstrap_admin(&self, admin: NewUser) -> Result<bool> {
        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_admin = 1")
            .fetch_one(&self.pool)
            .await?;
        if admins > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO users (username, email, password_hash, join_date, is_admin, is_active) \
             VALUES (?, ?, ?, ?, 1, 1)",
        )
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY join_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn toggle_user_active(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = NOT is_active WHERE id = ? AND is_admin = 0 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_file(&self, file: NewFile) -> Result<FileRecord> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO files (filename, original_name, filepath, size_mb, category,
                               description, tags, upload_date, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&file.filename)
        .bind(&file.original_name)
        .bind(&file.filepath)
        .bind(file.size_mb)
        .bind(file.category)
        .bind(&file.description)
        .bind(&file.tags)
        .bind(Utc::now())
        .bind(file.user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET uploads_count = uploads_count + 1 WHERE id = ?")
            .bind(file.user_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, FileRecord>(&format!("{FILE_SELECT} WHERE f.id = ?"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(&format!("{FILE_SELECT} WHERE f.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// list_files
    ///
    /// Builds the filter with QueryBuilder so every user-supplied value is bound, never
    /// interpolated. Search is a literal substring match over name, description and tags.
    async fn list_files(&self, filter: &FileFilter) -> Result<Vec<FileRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(FILE_SELECT);
        builder.push(" WHERE 1 = 1");

        if let Some(category) = &filter.category {
            builder.push(" AND f.category = ");
            builder.push_bind(category.clone());
        }

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            builder.push(" AND (f.original_name LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR f.description LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR f.tags LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }

        if filter.featured_only {
            builder.push(" AND f.is_featured = 1");
        }

        builder.push(" ORDER BY f.upload_date DESC, f.id DESC");

        let files = builder
            .build_query_as::<FileRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn record_download(&self, file_id: i64, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE files SET download_count = download_count + 1 WHERE id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET downloads_count = downloads_count + 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_file(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<i64> = sqlx::query_scalar("DELETE FROM files WHERE id = ? RETURNING user_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(owner) = owner else {
            return Ok(false);
        };

        sqlx::query("UPDATE users SET uploads_count = MAX(uploads_count - 1, 0) WHERE id = ?")
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn toggle_featured(&self, id: i64) -> Result<Option<FileRecord>> {
        let updated = sqlx::query("UPDATE files SET is_featured = NOT is_featured WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_file(id).await
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> Result<Invitation> {
        let created = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (email, invite_code, invited_by, message, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, email, invite_code, invited_by, message, created_at, used, used_at
            "#,
        )
        .bind(&invitation.email)
        .bind(&invitation.invite_code)
        .bind(&invitation.invited_by)
        .bind(&invitation.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_invitation(&self, code: &str) -> Result<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>(
            "SELECT id, email, invite_code, invited_by, message, created_at, used, used_at \
             FROM invitations WHERE invite_code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn consume_invitation(&self, code: &str, email: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        consume_invitation_on(&mut conn, code, email, Utc::now()).await
    }

    async fn create_ticket(&self, ticket: NewTicket) -> Result<SupportTicket> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO support_tickets (title, description, priority, status, created_date, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.priority)
        .bind(TicketStatus::Open)
        .bind(Utc::now())
        .bind(ticket.user_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_ticket(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("ticket {} vanished after insert", id)))
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<SupportTicket>> {
        let ticket = sqlx::query_as::<_, SupportTicket>(&format!("{TICKET_SELECT} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn list_tickets(&self, owner: Option<i64>) -> Result<Vec<SupportTicket>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(TICKET_SELECT);
        if let Some(user_id) = owner {
            builder.push(" WHERE t.user_id = ");
            builder.push_bind(user_id);
        }
        builder.push(" ORDER BY t.created_date DESC, t.id DESC");

        let tickets = builder
            .build_query_as::<SupportTicket>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    /// respond_to_ticket
    ///
    /// `resolved_date` is stamped only on the open -> resolved transition, kept while a
    /// ticket stays resolved, and cleared when it is reopened. The CASE reads the old
    /// row values, so the decision and the write are one statement.
    async fn respond_to_ticket(
        &self,
        id: i64,
        response: String,
        status: TicketStatus,
    ) -> Result<Option<SupportTicket>> {
        let updated = sqlx::query(
            r#"
            UPDATE support_tickets
            SET admin_response = ?1,
                status = ?2,
                resolved_date = CASE
                    WHEN ?2 = 'resolved' AND status <> 'resolved' THEN ?3
                    WHEN ?2 = 'resolved' THEN resolved_date
                    ELSE NULL
                END
            WHERE id = ?4
            "#,
        )
        .bind(response)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_ticket(id).await
    }

    /// get_analytics
    ///
    /// Compiles every dashboard figure. Read-only.
    async fn get_analytics(&self, recent_limit: i64) -> Result<Analytics> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let active_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        let total_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        let total_downloads: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(download_count), 0) FROM files")
                .fetch_one(&self.pool)
                .await?;

        let categories = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM files GROUP BY category ORDER BY count DESC, category ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_uploads = sqlx::query_as::<_, FileRecord>(&format!(
            "{FILE_SELECT} ORDER BY f.upload_date DESC, f.id DESC LIMIT ?"
        ))
        .bind(recent_limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(FileResponse::from)
        .collect();

        Ok(Analytics {
            stats: AnalyticsStats {
                total_users,
                active_users,
                total_files,
                total_downloads,
            },
            categories,
            recent_uploads,
        })
    }
}
