//! URL-based store selection.
//!
//! | URL               | Store                                       |
//! |-------------------|---------------------------------------------|
//! | `memory`          | fresh [`MemoryStore`]                       |
//! | `memory:<name>`   | [`MemoryStore`] shared under `name`         |
//! | `file:<path>`     | [`FileStore`] at `path`                     |
//! | `memorydb`        | [`RowTableStore`] over a fresh table        |
//! | `memorydb:<name>` | [`RowTableStore`] over a table shared by name |
//!
//! Named instances belong to the registry that created them.

use crate::error::{Result, StoreError};
use crate::graph::{FileStore, FileStoreConfig, MemoryStore};
use crate::rows::MemoryTable;
use crate::store::Store;
use crate::table_store::RowTableStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Opens stores for the URLs it recognizes.
pub trait StoreProvider: Send + Sync {
    /// `Ok(None)` if `url` is not handled by this provider.
    fn open_store(&self, url: &str) -> Result<Option<Arc<dyn Store>>>;
}

/// Instances shared by name.
struct Named<T> {
    instances: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: Default> Named<T> {
    fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The instance called `name`; an empty name always gets a fresh one.
    fn get(&self, name: &str) -> Arc<T> {
        if name.is_empty() {
            return Arc::new(T::default());
        }
        self.instances
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(T::default()))
            .clone()
    }
}

/// The part of `url` after `scheme`, if `url` is `scheme` or `scheme:<rest>`.
fn strip_scheme<'a>(url: &'a str, scheme: &str) -> Option<&'a str> {
    let rest = url.strip_prefix(scheme)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(':')
    }
}

/// `memory` and `memory:<name>`.
pub struct MemoryStoreProvider {
    named: Named<MemoryStore>,
}

impl MemoryStoreProvider {
    pub fn new() -> Self {
        Self {
            named: Named::new(),
        }
    }
}

impl Default for MemoryStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for MemoryStoreProvider {
    fn open_store(&self, url: &str) -> Result<Option<Arc<dyn Store>>> {
        Ok(strip_scheme(url, "memory").map(|name| self.named.get(name) as Arc<dyn Store>))
    }
}

/// `file:<path>`.
#[derive(Default)]
pub struct FileStoreProvider;

impl StoreProvider for FileStoreProvider {
    fn open_store(&self, url: &str) -> Result<Option<Arc<dyn Store>>> {
        match url.strip_prefix("file:") {
            Some(path) => {
                let store = FileStore::open(FileStoreConfig::new(path))?;
                Ok(Some(Arc::new(store)))
            }
            None => Ok(None),
        }
    }
}

/// `memorydb` and `memorydb:<name>`.
pub struct MemoryTableProvider {
    tables: Named<MemoryTable>,
}

impl MemoryTableProvider {
    pub fn new() -> Self {
        Self {
            tables: Named::new(),
        }
    }
}

impl Default for MemoryTableProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for MemoryTableProvider {
    fn open_store(&self, url: &str) -> Result<Option<Arc<dyn Store>>> {
        Ok(strip_scheme(url, "memorydb").map(|name| {
            let table = self.tables.get(name);
            Arc::new(RowTableStore::new(table)) as Arc<dyn Store>
        }))
    }
}

/// Resolves store URLs by asking each provider in registration order.
pub struct StoreRegistry {
    providers: Vec<Box<dyn StoreProvider>>,
}

impl StoreRegistry {
    /// A registry with the built-in providers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(MemoryStoreProvider::new());
        registry.register(FileStoreProvider);
        registry.register(MemoryTableProvider::new());
        registry
    }

    /// A registry without any providers.
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: impl StoreProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    pub fn open(&self, url: &str) -> Result<Arc<dyn Store>> {
        for provider in &self.providers {
            if let Some(store) = provider.open_store(url)? {
                tracing::debug!(url, "store opened");
                return Ok(store);
            }
        }
        Err(StoreError::UnknownUrl(url.to_string()))
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}
