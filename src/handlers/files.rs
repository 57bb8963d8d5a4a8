use crate::{
    AppState,
    auth::{AuthUser, Capability},
    error::{AppError, ErrorBody, Result},
    handlers::non_empty,
    models::{
        Category, FileFilter, FileListResponse, FileRecord, FileResponse, MessageResponse, NewFile,
        UploadForm, UploadResponse,
    },
    storage::{BlobStream, StorageError, is_pdf_name, sanitize_pdf_name},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

/// FileQuery
///
/// Query parameters accepted by the public listing endpoint (GET /files).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct FileQuery {
    /// Exact category name. Empty or `all` means every category.
    pub category: Option<String>,
    /// Substring matched against name, description and tags.
    pub search: Option<String>,
    /// `true` restricts the listing to featured files.
    pub featured: Option<String>,
}

impl FileQuery {
    fn into_filter(self) -> FileFilter {
        let category = non_empty(self.category).filter(|c| !c.eq_ignore_ascii_case("all"));
        let featured_only = self
            .featured
            .as_deref()
            .map(str::trim)
            .is_some_and(|f| f.eq_ignore_ascii_case("true") || f == "1");

        FileFilter {
            category,
            search: non_empty(self.search),
            featured_only,
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

async fn field_text(field: Field<'_>) -> Result<String> {
    field.text().await.map_err(multipart_error)
}

/// upload_file
///
/// [Authenticated Route] Accepts one PDF via multipart. The blob is written first;
/// the file record and the uploader's counter then commit together. If that commit
/// fails the blob stays behind as an orphan and is logged.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Uploaded", body = UploadResponse),
        (status = 400, description = "Missing, non-PDF or unusable file", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn upload_file(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut pdf: Option<(String, Bytes)> = None;
    let mut category = None;
    let mut description = None;
    let mut tags = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pdf" => {
                if pdf.is_some() {
                    return Err(AppError::BadRequest(
                        "Only one file can be uploaded per request".to_string(),
                    ));
                }
                let client_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                pdf = Some((client_name, data));
            }
            "category" => category = Some(field_text(field).await?),
            "description" => description = Some(field_text(field).await?),
            "tags" => tags = Some(field_text(field).await?),
            _ => {}
        }
    }

    let Some((client_name, data)) = pdf.filter(|(name, _)| !name.is_empty()) else {
        return Err(AppError::BadRequest("No file provided".to_string()));
    };
    if !is_pdf_name(&client_name) {
        return Err(AppError::BadRequest("Only PDF files are allowed".to_string()));
    }
    let Some(original_name) = sanitize_pdf_name(&client_name) else {
        return Err(AppError::BadRequest("Invalid filename".to_string()));
    };

    let blob = state.storage.save(&original_name, &data).await?;

    let new_file = NewFile {
        filename: blob.storage_name.clone(),
        original_name: original_name.clone(),
        filepath: blob.path.clone(),
        size_mb: blob.size_mb(),
        category: Category::parse_or_default(category.as_deref()),
        description: non_empty(description).unwrap_or_default(),
        tags: non_empty(tags),
        user_id: user.id,
    };

    let record = match state.repo.create_file(new_file).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                storage_name = %blob.storage_name,
                "File record not saved; blob left orphaned"
            );
            return Err(e);
        }
    };

    tracing::info!(
        file_id = record.id,
        user_id = user.id,
        storage_name = %record.filename,
        size_mb = record.size_mb,
        "File uploaded"
    );

    Ok(Json(UploadResponse {
        message: "Upload successful".to_string(),
        filename: record.filename,
        original_name: record.original_name,
    }))
}

/// list_files
///
/// [Public Route] Lists files newest first, optionally filtered by category, search
/// text and the featured flag. The full category list rides along for the UI.
#[utoipa::path(
    get,
    path = "/files",
    params(FileQuery),
    responses((status = 200, description = "Matching files", body = FileListResponse)),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileListResponse>> {
    let files = state.repo.list_files(&query.into_filter()).await?;

    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
        categories: Category::names(),
    }))
}

async fn find_file(state: &AppState, id: i64) -> Result<FileRecord> {
    state
        .repo
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))
}

async fn open_blob(state: &AppState, file: &FileRecord) -> Result<BlobStream> {
    match state.storage.open(&file.filename).await {
        Ok(blob) => Ok(blob),
        Err(StorageError::NotFound(_)) => {
            tracing::warn!(file_id = file.id, storage_name = %file.filename, "Blob missing on disk");
            Err(AppError::NotFound("File not found on disk".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn pdf_response(blob: BlobStream, file_name: &str, disposition: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", disposition, file_name),
            ),
        ],
        Body::from_stream(blob),
    )
        .into_response()
}

/// download_file
///
/// [Authenticated Route] Streams the PDF as an attachment and bumps both the file's
/// and the caller's download counters in one transaction.
#[utoipa::path(
    get,
    path = "/download/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "PDF bytes (application/pdf)"),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 404, description = "Unknown file or blob missing", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn download_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let file = find_file(&state, id).await?;
    let blob = open_blob(&state, &file).await?;

    if !state.repo.record_download(file.id, user.id).await? {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    tracing::info!(file_id = file.id, user_id = user.id, "File downloaded");
    Ok(pdf_response(blob, &file.original_name, "attachment"))
}

/// preview_file
///
/// [Public Route] Same bytes as a download, shown inline. Counters are untouched.
#[utoipa::path(
    get,
    path = "/preview/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "PDF bytes (application/pdf)"),
        (status = 404, description = "Unknown file or blob missing", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn preview_file(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let file = find_file(&state, id).await?;
    let blob = open_blob(&state, &file).await?;
    Ok(pdf_response(blob, &file.original_name, "inline"))
}

/// delete_file
///
/// [Authenticated Route] Owner or admin only. Blob removal is best-effort; the
/// record delete and the owner's counter decrement commit together.
#[utoipa::path(
    delete,
    path = "/delete/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 403, description = "Neither owner nor admin", body = ErrorBody),
        (status = 404, description = "Unknown file", body = ErrorBody)
    ),
    tag = "files"
)]
pub async fn delete_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let file = find_file(&state, id).await?;
    user.authorize(
        Capability::OwnerOrAdmin {
            owner_id: file.user_id,
        },
        Some("You can only delete your own files"),
    )?;

    if let Err(e) = state.storage.delete(&file.filename).await {
        tracing::warn!(file_id = file.id, error = %e, "Blob removal failed; deleting record anyway");
    }

    if !state.repo.delete_file(file.id).await? {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    tracing::info!(file_id = file.id, deleted_by = user.id, "File deleted");
    Ok(Json(MessageResponse::new("File deleted successfully")))
}
