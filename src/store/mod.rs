//! Local cache store rooted at one directory per cache kind.
//!
//! Every path handed out by this module lives directly under
//! `<cache_root>/images` or `<cache_root>/downloads`; entry names are checked
//! to be a single plain path segment, so callers cannot escape the cache root.
//!
//! Writes are atomic from a reader's point of view: bytes land in a hidden
//! `.<name>.<nonce>.part` file that is flushed, synced, and renamed over the
//! target. Listings skip hidden entries, so an interrupted write is never
//! observed as a cache entry.

mod error;

pub use error::StoreError;

use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use rand::Rng;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Suffix of in-progress write files.
const PARTIAL_SUFFIX: &str = ".part";

/// The two cache areas the core maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Thumbnail images, keyed by resource id.
    Images,
    /// Downloaded attachments and their sidecars.
    Downloads,
}

impl CacheKind {
    /// Directory name of this cache under the root.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Downloads => "downloads",
        }
    }
}

/// Handle to the cache root. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `root`. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory handle for `kind`.
    #[must_use]
    pub fn dir(&self, kind: CacheKind) -> CacheDir {
        CacheDir {
            path: self.root.join(kind.dir_name()),
            kind,
        }
    }
}

/// One entry found by [`CacheDir::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// File name inside the cache directory.
    pub name: String,
    /// Absolute path of the entry.
    pub path: PathBuf,
    /// Byte length read from the filesystem at listing time.
    pub size: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

/// A single cache directory (`images` or `downloads`).
#[derive(Debug, Clone)]
pub struct CacheDir {
    path: PathBuf,
    kind: CacheKind,
}

impl CacheDir {
    /// Absolute path of this directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which cache this directory holds.
    #[must_use]
    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    /// Resolves `name` to a path inside this directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] unless `name` is a single plain
    /// path segment that does not start with `.`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_plain_segment(name) {
            return Err(StoreError::invalid_name(name));
        }
        Ok(self.path.join(name))
    }

    /// Creates the directory (and parents) if missing.
    ///
    /// Concurrent callers may race; an already-existing directory is success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    #[instrument(skip(self), fields(dir = %self.path.display()))]
    pub async fn ensure(&self) -> Result<(), StoreError> {
        match fs::create_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists && self.path.is_dir() => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Whether an entry called `name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for unsafe names and
    /// [`StoreError::Io`] if existence cannot be determined.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.resolve(name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    /// Reads the whole entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the entry is missing or unreadable.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(name)?;
        fs::read(&path).await.map_err(|e| StoreError::io(path, e))
    }

    /// Atomically writes `bytes` as entry `name`, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on any write, sync, or rename failure; the
    /// previous content (if any) is left untouched in that case.
    #[instrument(skip(self, bytes), fields(dir = %self.path.display(), len = bytes.len()))]
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let mut partial = self.create_partial(name).await?;
        let written = async {
            partial.file.write_all(bytes).await?;
            partial.file.flush().await
        }
        .await;
        if let Err(e) = written {
            let path = partial.temp.clone();
            self.discard_partial(partial).await;
            return Err(StoreError::io(path, e));
        }
        self.commit_partial(partial).await
    }

    /// Removes entry `name`.
    ///
    /// Returns `Ok(false)` if it did not exist, so deleting twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for failures other than "not found".
    #[instrument(skip(self), fields(dir = %self.path.display()))]
    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "cache entry deleted");
                Ok(true)
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Looks up one entry; `None` if it does not exist or is not a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for unsafe names and
    /// [`StoreError::Io`] if the metadata cannot be read.
    pub async fn entry(&self, name: &str) -> Result<Option<StoreEntry>, StoreError> {
        let path = self.resolve(name)?;
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        if !metadata.is_file() {
            return Ok(None);
        }
        Ok(Some(StoreEntry {
            name: name.to_string(),
            path,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }))
    }

    /// Lists regular files in this directory, skipping hidden and in-progress entries.
    ///
    /// A directory that does not exist yet lists as empty. Entries that vanish
    /// between the directory scan and their metadata lookup are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory exists but cannot be read.
    pub async fn list(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let mut reader = match fs::read_dir(&self.path).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 cache entry");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == IoErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(entry.path(), e)),
            };
            if !metadata.is_file() {
                continue;
            }
            entries.push(StoreEntry {
                name,
                path: entry.path(),
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Opens a hidden temp file that will become entry `name` on commit.
    pub(crate) async fn create_partial(&self, name: &str) -> Result<PartialFile, StoreError> {
        let target = self.resolve(name)?;
        let nonce: u32 = rand::thread_rng().r#gen();
        let temp = self.path.join(format!(".{name}.{nonce:08x}{PARTIAL_SUFFIX}"));
        let file = File::create(&temp)
            .await
            .map_err(|e| StoreError::io(&temp, e))?;
        Ok(PartialFile { temp, target, file })
    }

    /// Syncs and renames a partial file over its target.
    pub(crate) async fn commit_partial(&self, partial: PartialFile) -> Result<PathBuf, StoreError> {
        let PartialFile { temp, target, file } = partial;
        if let Err(e) = file.sync_all().await {
            drop(file);
            remove_quietly(&temp).await;
            return Err(StoreError::io(&temp, e));
        }
        drop(file);
        if let Err(e) = fs::rename(&temp, &target).await {
            remove_quietly(&temp).await;
            return Err(StoreError::io(&target, e));
        }
        debug!(path = %target.display(), "cache entry committed");
        Ok(target)
    }

    /// Drops a partial file without touching its target.
    pub(crate) async fn discard_partial(&self, partial: PartialFile) {
        let PartialFile { temp, file, .. } = partial;
        drop(file);
        remove_quietly(&temp).await;
    }
}

/// An in-progress write. Either committed or discarded by its [`CacheDir`].
#[derive(Debug)]
pub(crate) struct PartialFile {
    temp: PathBuf,
    target: PathBuf,
    pub(crate) file: File,
}

impl PartialFile {
    /// Path of the hidden temp file.
    pub(crate) fn temp_path(&self) -> &Path {
        &self.temp
    }
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == IoErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}

/// True when `name` is exactly one normal path component and not hidden.
pub(crate) fn is_plain_segment(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
