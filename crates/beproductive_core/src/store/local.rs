//! Local key-file store contract and filesystem implementation.
//!
//! # Responsibility
//! - Define the async `LocalStore` contract consumed by collection services.
//! - Persist one text record per file under a single root directory.
//!
//! # Invariants
//! - Paths are plain file names relative to the store root; separators and
//!   dot-segments are rejected.
//! - Writes replace the whole file atomically (temp file + rename).
//! - Every failure is reported as `LocalStoreError`, never a panic.

use async_trait::async_trait;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type LocalResult<T> = Result<T, LocalStoreError>;

/// Local store failure.
#[derive(Debug)]
pub enum LocalStoreError {
    Io {
        op: &'static str,
        path: String,
        source: io::Error,
    },
    NotFound(String),
    InvalidPath(String),
}

impl Display for LocalStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { op, path, source } => write!(f, "local {op} failed for `{path}`: {source}"),
            Self::NotFound(path) => write!(f, "local record not found: `{path}`"),
            Self::InvalidPath(path) => write!(f, "invalid local record path `{path}`"),
        }
    }
}

impl Error for LocalStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::NotFound(_) | Self::InvalidPath(_) => None,
        }
    }
}

/// Key-file persistence used for free-tier and device-only items.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Lists file names starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> LocalResult<Vec<String>>;
    async fn read_text(&self, path: &str) -> LocalResult<String>;
    async fn write_text(&self, path: &str, text: &str) -> LocalResult<()>;
    /// Deletes one file. With `idempotent`, a missing file is not an error.
    async fn delete(&self, path: &str, idempotent: bool) -> LocalResult<()>;
}

/// `LocalStore` backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsLocalStore {
    root: PathBuf,
}

impl FsLocalStore {
    /// Creates the root directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> LocalResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| LocalStoreError::Io {
                op: "create_dir",
                path: root.display().to_string(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> LocalResult<PathBuf> {
        let valid = !path.is_empty()
            && path != "."
            && path != ".."
            && !path.contains(['/', '\\'])
            && !path.starts_with('.');
        if !valid {
            return Err(LocalStoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl LocalStore for FsLocalStore {
    async fn list(&self, prefix: &str) -> LocalResult<Vec<String>> {
        let io_err = |source| LocalStoreError::Io {
            op: "list",
            path: self.root.display().to_string(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(prefix) && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_text(&self, path: &str) -> LocalResult<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => LocalStoreError::NotFound(path.to_string()),
                _ => LocalStoreError::Io {
                    op: "read",
                    path: path.to_string(),
                    source,
                },
            })
    }

    async fn write_text(&self, path: &str, text: &str) -> LocalResult<()> {
        let full = self.resolve(path)?;
        let staging = self.root.join(format!(".{path}.tmp"));
        let io_err = |source| LocalStoreError::Io {
            op: "write",
            path: path.to_string(),
            source,
        };
        tokio::fs::write(&staging, text).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &full).await.map_err(io_err)?;
        debug!("event=local_write module=store status=ok bytes={}", text.len());
        Ok(())
    }

    async fn delete(&self, path: &str, idempotent: bool) -> LocalResult<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                if idempotent {
                    Ok(())
                } else {
                    Err(LocalStoreError::NotFound(path.to_string()))
                }
            }
            Err(source) => Err(LocalStoreError::Io {
                op: "delete",
                path: path.to_string(),
                source,
            }),
        }
    }
}
