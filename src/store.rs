//! Filesystem-backed render cache.
//!
//! One flat directory holds one `{id}.png` per preview. The store never renders
//! anything; it only answers whether an image exists and moves bytes in and out.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Public path previews are served under unless configured otherwise.
pub const DEFAULT_URL_PREFIX: &str = "/previews";

/// File extension of every stored preview.
pub const PREVIEW_EXTENSION: &str = "png";

const MAX_ID_LEN: usize = 128;
const TEMP_PREFIX: &str = ".tmp-";

// ============================================================================
// PreviewId
// ============================================================================

/// Error returned for identifiers that cannot be used as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid preview id `{id}`: {reason}")]
pub struct InvalidPreviewId {
    pub id: String,
    pub reason: &'static str,
}

/// A cache key that is safe to use as a file stem.
///
/// Allowed: 1 to 128 characters from `[A-Za-z0-9._-]`, not starting with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewId(String);

impl PreviewId {
    pub fn parse(value: &str) -> Result<Self, InvalidPreviewId> {
        let invalid = |reason| InvalidPreviewId {
            id: value.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if value.len() > MAX_ID_LEN {
            return Err(invalid("must be at most 128 characters"));
        }
        if value.starts_with('.') {
            return Err(invalid("must not start with `.`"));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(invalid("may only contain letters, digits, `-`, `_` and `.`"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file name this id is stored under.
    pub fn file_name(&self) -> String {
        format!("{}.{PREVIEW_EXTENSION}", self.0)
    }

    /// Recovers an id from a stored file name such as `blog-42.png`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".png")?;
        Self::parse(stem).ok()
    }
}

impl FromStr for PreviewId {
    type Err = InvalidPreviewId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PreviewId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Entries and errors
// ============================================================================

/// Metadata about one stored preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub id: PreviewId,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Last modification time of the file.
    pub created_at: OffsetDateTime,
    /// Hex SHA-256 of the contents; `None` when the contents were not read.
    pub checksum: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache directory `{path}` is not usable")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ============================================================================
// PreviewStore
// ============================================================================

/// Flat directory of rendered previews.
#[derive(Debug, Clone)]
pub struct PreviewStore {
    root: PathBuf,
    url_prefix: String,
}

impl PreviewStore {
    /// Creates a store over `root`. The directory is created on first write.
    ///
    /// `url_prefix` is the public path the directory is served under, for
    /// example `/previews`.
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public path the directory is served under, without a trailing slash.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn path(&self, id: &PreviewId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Public URL of the preview. Does not check that it exists.
    pub fn url(&self, id: &PreviewId) -> String {
        format!("{}/{}", self.url_prefix, id.file_name())
    }

    /// Whether a preview is stored for `id`. I/O failures count as absent.
    pub async fn exists(&self, id: &PreviewId) -> bool {
        match fs::metadata(self.path(id)).await {
            Ok(meta) => meta.is_file(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!(id = %id, error = %err, "cache lookup failed; treating as miss");
                false
            }
        }
    }

    /// Stores `bytes` for `id`, replacing any previous image.
    ///
    /// Bytes are written to a hidden temporary file and renamed into place, so
    /// readers see either the old image or the new one.
    pub async fn write(&self, id: &PreviewId, bytes: &[u8]) -> Result<CacheEntry, StoreError> {
        self.ensure_root().await?;

        let target = self.path(id);
        let temp = self.root.join(format!("{TEMP_PREFIX}{}-{}", Uuid::new_v4(), id.file_name()));

        if let Err(err) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }

        let meta = fs::metadata(&target).await?;
        debug!(id = %id, size_bytes = meta.len(), "preview stored");

        Ok(CacheEntry {
            id: id.clone(),
            path: target,
            size_bytes: meta.len(),
            created_at: modified_at(&meta),
            checksum: Some(checksum(bytes)),
        })
    }

    /// Reads the stored image, or `None` when there is none.
    pub async fn read(&self, id: &PreviewId) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns full metadata, including the checksum, for one stored image.
    pub async fn inspect(&self, id: &PreviewId) -> Result<Option<CacheEntry>, StoreError> {
        let path = self.path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let meta = fs::metadata(&path).await?;
        Ok(Some(CacheEntry {
            id: id.clone(),
            path,
            size_bytes: meta.len(),
            created_at: modified_at(&meta),
            checksum: Some(checksum(&bytes)),
        }))
    }

    /// Removes the image for `id`. Returns `false` if nothing was stored.
    pub async fn delete(&self, id: &PreviewId) -> Result<bool, StoreError> {
        match fs::remove_file(self.path(id)).await {
            Ok(()) => {
                debug!(id = %id, "preview deleted");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists stored previews, sorted by id. A missing directory is empty.
    pub async fn try_list(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Directory {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(id) = name.to_str().and_then(PreviewId::from_file_name) else {
                continue;
            };
            let meta = match item.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                // Removed between read_dir and metadata.
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push(CacheEntry {
                id,
                path: item.path(),
                size_bytes: meta.len(),
                created_at: modified_at(&meta),
                checksum: None,
            });
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Lists stored previews. Failures are logged and yield an empty list.
    pub async fn list(&self) -> Vec<CacheEntry> {
        match self.try_list().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(root = %self.root.display(), error = %err, "failed to list cache");
                Vec::new()
            }
        }
    }

    /// Deletes every stored preview and returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in self.try_list().await? {
            if self.delete(&entry.id).await? {
                removed += 1;
            }
        }
        debug!(removed, "cache cleared");
        Ok(removed)
    }

    async fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::Directory {
                path: self.root.clone(),
                source,
            })
    }
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn modified_at(meta: &std::fs::Metadata) -> OffsetDateTime {
    meta.modified()
        .map(OffsetDateTime::from)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

// ============================================================================
// Tests
// ============================================================================
