//! A memory store persisted to a single text file.

use crate::codec::{self, Format};
use crate::error::{Result, StoreError};
use crate::graph::memory_store::MemoryStore;
use crate::reference::Reference;
use crate::store::{Entry, Store};
use crate::types::Value;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// File holding the text form of the root value.
    pub path: PathBuf,

    /// Whether to start empty if the file doesn't exist.
    pub create_if_missing: bool,

    /// Layout of the file written on close.
    pub format: Format,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./store.txt"),
            create_if_missing: true,
            format: Format::Indent,
        }
    }
}

impl FileStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// A [`MemoryStore`] loaded from a file at open and written back at close.
///
/// The file is locked exclusively through `<path>.lock` for as long as the
/// store is alive. An absent root value deletes the file. Writes not yet
/// persisted by `close` are persisted best-effort on drop.
pub struct FileStore {
    config: FileStoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    inner: MemoryStore,

    /// Written since the last successful persist.
    dirty: AtomicBool,
}

impl FileStore {
    pub fn open(config: FileStoreConfig) -> Result<Self> {
        let exists = config.path.is_file();
        if !exists && !config.create_if_missing {
            return Err(StoreError::NotInitialized);
        }
        if let Some(dir) = config.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let value = if exists {
            Some(codec::parse(&fs::read_to_string(&config.path)?)?)
        } else {
            None
        };
        tracing::debug!(path = %config.path.display(), loaded = exists, "file store opened");

        Ok(Self {
            config,
            _lock_file: lock_file,
            inner: MemoryStore::with_value(value),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Write the current root value to the file, or delete the file if
    /// there is none.
    pub fn sync(&self) -> Result<()> {
        match self.inner.read(&Reference::root())? {
            Some(value) => {
                let text = codec::generate_with(&value, self.config.format);
                // write aside, then rename over the old file
                let staging = sibling(&self.config.path, "tmp");
                fs::write(&staging, text)?;
                fs::rename(&staging, &self.config.path)?;
            }
            None => {
                if self.config.path.exists() {
                    fs::remove_file(&self.config.path)?;
                }
            }
        }
        tracing::debug!(path = %self.config.path.display(), "file store synced");
        Ok(())
    }

    /// [`FileStore::sync`] if anything was written since the last persist.
    fn persist_pending(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.sync().map_err(|e| {
            self.dirty.store(true, Ordering::SeqCst);
            e
        })
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(sibling(path, "lock"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

/// `<path>.<extension>`, keeping any extension `path` already has.
fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

impl Store for FileStore {
    fn read(&self, reference: &Reference) -> Result<Option<Value>> {
        self.inner.read(reference)
    }

    fn write(&self, reference: &Reference, value: Option<Value>) -> Result<()> {
        self.inner.write(reference, value)?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn browse(&self, reference: &Reference) -> Result<Vec<Entry>> {
        self.inner.browse(reference)
    }

    /// Persist pending writes. The lock is held until the store is dropped.
    fn close(&self) -> Result<()> {
        self.persist_pending()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        if let Err(e) = self.persist_pending() {
            tracing::warn!(path = %self.config.path.display(), error = %e, "failed to persist file store");
        }
    }
}
