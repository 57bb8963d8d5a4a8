use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, stream::BoxStream};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// StorageError
///
/// Failure modes of the blob store. `NotFound` is the only variant handlers treat as
/// a client-visible condition.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// StoredBlob
///
/// Result of a successful write: where the blob lives and how big it is.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    /// Generated, unique name the blob is stored under.
    pub storage_name: String,
    /// Full path recorded alongside the file entity.
    pub path: String,
    pub size_bytes: u64,
}

impl StoredBlob {
    /// Size in MiB rounded to two decimals, as shown in listings.
    pub fn size_mb(&self) -> f64 {
        let mb = self.size_bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}

/// Chunked blob contents, as handed to the response body.
pub type BlobStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the blob store. Handlers only see this trait, so the
/// on-disk implementation can be swapped for the in-memory mock in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the storage root if it does not exist yet.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Persists `data` under a freshly generated name derived from the already
    /// sanitized `original_name`. Never overwrites an existing blob.
    async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredBlob, StorageError>;

    /// Reads a whole blob back by storage name.
    async fn read(&self, storage_name: &str) -> Result<Vec<u8>, StorageError>;

    /// Opens a blob for streaming. Fails with `NotFound` up front, before any byte is
    /// sent.
    async fn open(&self, storage_name: &str) -> Result<BlobStream, StorageError>;

    /// Removes a blob. Removing a blob that is already gone succeeds.
    async fn delete(&self, storage_name: &str) -> Result<(), StorageError>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

// 2. The Real Implementation (local filesystem)
/// LocalStorage
///
/// Keeps blobs as flat files inside one upload directory.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, storage_name: &str) -> Result<PathBuf, StorageError> {
        // Storage names come from the database, but never let one escape the root.
        if storage_name.is_empty()
            || storage_name.contains('/')
            || storage_name.contains('\\')
            || storage_name.starts_with('.')
        {
            return Err(StorageError::NotFound(storage_name.to_string()));
        }
        Ok(self.root.join(storage_name))
    }
}

/// Upper bound on suffixed retries when a generated name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 1000;

const READ_CHUNK_BYTES: usize = 64 * 1024;

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// save
    ///
    /// Opens the target with create-new semantics so two uploads landing in the same
    /// second with the same name cannot clobber each other; the loser retries with a
    /// numeric suffix.
    async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredBlob, StorageError> {
        let stamp = timestamp_prefix();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let storage_name = generate_storage_name(&stamp, attempt, original_name);
            let path = self.root.join(&storage_name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            file.write_all(data).await?;
            file.flush().await?;

            tracing::debug!(storage_name = %storage_name, bytes = data.len(), "blob written");

            return Ok(StoredBlob {
                storage_name,
                path: path.to_string_lossy().into_owned(),
                size_bytes: data.len() as u64,
            });
        }

        Err(StorageError::Unavailable(format!(
            "no free storage name for {}",
            original_name
        )))
    }

    async fn read(&self, storage_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(storage_name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, storage_name: &str) -> Result<BlobStream, StorageError> {
        let path = self.path_for(storage_name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let chunks = futures::stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; READ_CHUNK_BYTES];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok::<_, std::io::Error>(None);
            }
            buf.truncate(n);
            Ok(Some((buf, file)))
        });
        Ok(chunks.boxed())
    }

    async fn delete(&self, storage_name: &str) -> Result<(), StorageError> {
        let path = self.path_for(storage_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// timestamp_prefix
///
/// Second-resolution UTC stamp that prefixes every storage name.
fn timestamp_prefix() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// generate_storage_name
///
/// `<stamp>_<name>` on the first attempt, `<stamp>_<n>_<name>` afterwards.
pub fn generate_storage_name(stamp: &str, attempt: u32, original_name: &str) -> String {
    if attempt == 0 {
        format!("{}_{}", stamp, original_name)
    } else {
        format!("{}_{}_{}", stamp, attempt, original_name)
    }
}

/// sanitize_filename
///
/// Reduces a client-supplied filename to a safe, flat ASCII name: path separators and
/// whitespace become `_`, anything outside `[A-Za-z0-9._-]` is dropped, and leading or
/// trailing dots/underscores are trimmed. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => out.push(ch),
            '/' | '\\' => out.push('_'),
            c if c.is_whitespace() => out.push('_'),
            _ => {}
        }
    }

    // Collapse runs of underscores introduced by separators.
    let mut collapsed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }

    collapsed.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// is_pdf_name
///
/// Extension-based check only; content is never sniffed.
pub fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// sanitize_pdf_name
///
/// Sanitizes a client PDF name and returns it only if it still has a non-empty stem
/// and the `.pdf` extension. `__.pdf` or `日本語.pdf` reduce to `pdf` and are refused.
pub fn sanitize_pdf_name(name: &str) -> Option<String> {
    let sanitized = sanitize_filename(name);
    (sanitized.len() > ".pdf".len() && is_pdf_name(&sanitized)).then_some(sanitized)
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory `StorageService` used by handler tests. Names are generated exactly like
/// the real store; `should_fail` makes every write fail.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, `save` returns a simulated failure.
    pub should_fail: bool,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, storage_name: &str) -> bool {
        self.lock().contains_key(storage_name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A panicking test thread must not wedge every other test using the mock.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(&self, original_name: &str, data: &[u8]) -> Result<StoredBlob, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let stamp = timestamp_prefix();
        let mut blobs = self.lock();
        let mut attempt = 0;
        let storage_name = loop {
            let candidate = generate_storage_name(&stamp, attempt, original_name);
            if !blobs.contains_key(&candidate) {
                break candidate;
            }
            attempt += 1;
        };
        blobs.insert(storage_name.clone(), data.to_vec());

        Ok(StoredBlob {
            path: format!("memory://{}", storage_name),
            storage_name,
            size_bytes: data.len() as u64,
        })
    }

    async fn read(&self, storage_name: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(storage_name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_name.to_string()))
    }

    async fn open(&self, storage_name: &str) -> Result<BlobStream, StorageError> {
        let data = self.read(storage_name).await?;
        Ok(futures::stream::iter([Ok(data)]).boxed())
    }

    async fn delete(&self, storage_name: &str) -> Result<(), StorageError> {
        self.lock().remove(storage_name);
        Ok(())
    }
}
