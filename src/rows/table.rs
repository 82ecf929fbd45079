//! The row-table contract.
//!
//! A row table stores a value tree as flat rows keyed by `(parent, key)`.
//! Backends hand out read transactions over a consistent snapshot and write
//! transactions that publish their changes only when marked for commit.

use crate::error::Result;
use crate::rows::path::Path;
use crate::rows::row::Row;

/// Owned rows yielded by a selection.
pub type RowIter<'a> = Box<dyn Iterator<Item = Row> + 'a>;

/// Queries available inside any transaction.
pub trait RowRead {
    /// Every row, ordered by `(parent, key)`.
    fn select_all(&self) -> Result<RowIter<'_>>;

    fn select_single(&self, parent: &Path, key: &str) -> Result<Option<Row>>;

    /// Rows whose parent is exactly `parent`, ordered by key.
    fn select_children(&self, parent: &Path) -> Result<RowIter<'_>>;

    /// Rows whose parent starts with `parent`, in depth-first order: ordered
    /// by `(fullpath, key)` where a scalar's fullpath is `parent + [0]`.
    fn select_descendants(&self, parent: &Path) -> Result<RowIter<'_>>;
}

/// Mutations available inside a write transaction.
pub trait RowWrite: RowRead {
    /// A suffix for a new complex child of `parent`. Never returns a suffix
    /// that was previously inserted or allocated under `parent`.
    fn allocate_suffix(&mut self, parent: &Path) -> Result<u32>;

    /// Fails with `DuplicateRow` if `(parent, key)` is taken.
    fn insert(&mut self, row: Row) -> Result<()>;

    /// Returns whether a row was removed.
    fn delete_single(&mut self, parent: &Path, key: &str) -> Result<bool>;

    /// Removes every row whose parent starts with `parent`. Returns the count.
    fn delete_descendants(&mut self, parent: &Path) -> Result<usize>;

    /// Removes every row and forgets allocated suffixes.
    fn delete_all(&mut self) -> Result<()>;
}

/// Lifecycle of a write transaction.
pub trait RowTransaction: RowWrite {
    /// Publish the changes when the transaction closes.
    fn mark_commit(&mut self);

    /// End the transaction. Unmarked changes are discarded.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A row-table backend.
pub trait Database: Send + Sync {
    fn open_read(&self) -> Result<Box<dyn RowRead + '_>>;

    fn open_write(&self) -> Result<Box<dyn RowTransaction + '_>>;
}
