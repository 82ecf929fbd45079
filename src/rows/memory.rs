//! In-memory row table with snapshot transactions.
//!
//! The table holds one immutable snapshot behind a lock. Read transactions
//! clone the snapshot handle and never block writers. Write transactions
//! copy the snapshot on first mutation and swap their copy in on close when
//! marked for commit. Concurrent writers do not merge: the last one to close
//! wins.

use crate::error::{Result, StoreError};
use crate::rows::path::Path;
use crate::rows::row::Row;
use crate::rows::table::{Database, RowIter, RowRead, RowTransaction, RowWrite};
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RowKey {
    parent: Path,
    key: String,
}

impl RowKey {
    fn new(parent: &Path, key: &str) -> Self {
        Self {
            parent: parent.clone(),
            key: key.to_string(),
        }
    }

    /// Smallest key whose parent is `parent`.
    fn first_under(parent: &Path) -> Self {
        Self::new(parent, "")
    }
}

#[derive(Clone, Default)]
struct TableSnapshot {
    rows: BTreeMap<RowKey, Row>,
    /// Highest suffix ever inserted or allocated per parent.
    suffix_marks: HashMap<Path, u32>,
}

impl TableSnapshot {
    fn single(&self, parent: &Path, key: &str) -> Option<Row> {
        self.rows.get(&RowKey::new(parent, key)).cloned()
    }

    fn children<'a>(&'a self, parent: &'a Path) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows
            .range(RowKey::first_under(parent)..)
            .take_while(move |(k, _)| k.parent == *parent)
            .map(|(_, row)| row)
    }

    fn descendant_entries<'a>(
        &'a self,
        parent: &'a Path,
    ) -> impl Iterator<Item = (&'a RowKey, &'a Row)> + 'a {
        // parents extending `parent` sort contiguously right after it
        self.rows
            .range(RowKey::first_under(parent)..)
            .take_while(move |(k, _)| k.parent.starts_with(parent))
    }

    fn descendants(&self, parent: &Path) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .descendant_entries(parent)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_cached_key(Row::iteration_key);
        rows
    }

    fn allocate_suffix(&mut self, parent: &Path) -> Result<u32> {
        let mark = self.suffix_marks.get(parent).copied().unwrap_or(0);
        let next = mark.checked_add(1).ok_or_else(|| {
            StoreError::Corruption(format!("suffixes exhausted under {}", parent))
        })?;
        self.suffix_marks.insert(parent.clone(), next);
        Ok(next)
    }

    fn insert(&mut self, row: Row) -> Result<()> {
        match self.rows.entry(RowKey::new(row.parent(), row.key())) {
            Entry::Occupied(_) => Err(StoreError::DuplicateRow {
                parent: row.parent().clone(),
                key: row.key().to_string(),
            }),
            Entry::Vacant(slot) => {
                if let Some(suffix) = row.suffix() {
                    let mark = self.suffix_marks.entry(row.parent().clone()).or_insert(0);
                    *mark = (*mark).max(suffix);
                }
                slot.insert(row);
                Ok(())
            }
        }
    }

    fn delete_single(&mut self, parent: &Path, key: &str) -> bool {
        match self.rows.remove(&RowKey::new(parent, key)) {
            Some(row) => {
                // the parent's mark keeps this fullpath from being reissued
                if let Some(path) = row.fullpath() {
                    self.forget_marks(&path, true);
                }
                true
            }
            None => false,
        }
    }

    fn delete_descendants(&mut self, parent: &Path) -> usize {
        let doomed: Vec<RowKey> = self
            .descendant_entries(parent)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.rows.remove(key);
        }
        // `parent` may still be live, so its own mark stays
        self.forget_marks(parent, false);
        doomed.len()
    }

    /// Drop the suffix marks of paths below `path`, and of `path` itself if
    /// `inclusive`.
    fn forget_marks(&mut self, path: &Path, inclusive: bool) {
        self.suffix_marks
            .retain(|mark, _| !(mark.starts_with(path) && (inclusive || mark.len() > path.len())));
    }

    fn delete_all(&mut self) {
        self.rows.clear();
        self.suffix_marks.clear();
    }
}

/// A row table held entirely in memory.
#[derive(Default)]
pub struct MemoryTable {
    current: RwLock<Arc<TableSnapshot>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction over the currently published snapshot.
    pub fn read(&self) -> ReadTransaction {
        ReadTransaction {
            snapshot: self.current.read().clone(),
        }
    }

    /// A write transaction starting from the currently published snapshot.
    pub fn write(&self) -> WriteTransaction<'_> {
        WriteTransaction {
            table: self,
            snapshot: self.current.read().clone(),
            commit: false,
            closed: false,
        }
    }

    /// Number of rows in the published snapshot.
    pub fn row_count(&self) -> usize {
        self.current.read().rows.len()
    }

    fn publish(&self, snapshot: Arc<TableSnapshot>) {
        *self.current.write() = snapshot;
    }
}

impl Database for MemoryTable {
    fn open_read(&self) -> Result<Box<dyn RowRead + '_>> {
        Ok(Box::new(self.read()))
    }

    fn open_write(&self) -> Result<Box<dyn RowTransaction + '_>> {
        Ok(Box::new(self.write()))
    }
}

/// Read-only view of one snapshot.
pub struct ReadTransaction {
    snapshot: Arc<TableSnapshot>,
}

impl RowRead for ReadTransaction {
    fn select_all(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.snapshot.rows.values().cloned()))
    }

    fn select_single(&self, parent: &Path, key: &str) -> Result<Option<Row>> {
        Ok(self.snapshot.single(parent, key))
    }

    fn select_children(&self, parent: &Path) -> Result<RowIter<'_>> {
        let rows: Vec<Row> = self.snapshot.children(parent).cloned().collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn select_descendants(&self, parent: &Path) -> Result<RowIter<'_>> {
        Ok(Box::new(self.snapshot.descendants(parent).into_iter()))
    }
}

/// A private copy of the table, published on close if marked for commit.
pub struct WriteTransaction<'a> {
    table: &'a MemoryTable,
    snapshot: Arc<TableSnapshot>,
    commit: bool,
    closed: bool,
}

impl WriteTransaction<'_> {
    fn snapshot_mut(&mut self) -> &mut TableSnapshot {
        Arc::make_mut(&mut self.snapshot)
    }

    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.commit {
            tracing::debug!(rows = self.snapshot.rows.len(), "row table commit");
            self.table.publish(self.snapshot.clone());
        } else {
            tracing::trace!("row table write discarded");
        }
    }
}

impl RowRead for WriteTransaction<'_> {
    fn select_all(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.snapshot.rows.values().cloned()))
    }

    fn select_single(&self, parent: &Path, key: &str) -> Result<Option<Row>> {
        Ok(self.snapshot.single(parent, key))
    }

    fn select_children(&self, parent: &Path) -> Result<RowIter<'_>> {
        let rows: Vec<Row> = self.snapshot.children(parent).cloned().collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn select_descendants(&self, parent: &Path) -> Result<RowIter<'_>> {
        Ok(Box::new(self.snapshot.descendants(parent).into_iter()))
    }
}

impl RowWrite for WriteTransaction<'_> {
    fn allocate_suffix(&mut self, parent: &Path) -> Result<u32> {
        self.snapshot_mut().allocate_suffix(parent)
    }

    fn insert(&mut self, row: Row) -> Result<()> {
        self.snapshot_mut().insert(row)
    }

    fn delete_single(&mut self, parent: &Path, key: &str) -> Result<bool> {
        Ok(self.snapshot_mut().delete_single(parent, key))
    }

    fn delete_descendants(&mut self, parent: &Path) -> Result<usize> {
        Ok(self.snapshot_mut().delete_descendants(parent))
    }

    fn delete_all(&mut self) -> Result<()> {
        self.snapshot_mut().delete_all();
        Ok(())
    }
}

impl RowTransaction for WriteTransaction<'_> {
    fn mark_commit(&mut self) {
        self.commit = true;
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.finish();
        Ok(())
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complex(parent: &[u32], key: &str, suffix: u32) -> Row {
        Row::complex(Path::of(parent), key, suffix).unwrap()
    }

    fn scalar(parent: &[u32], key: &str, value: &str) -> Row {
        Row::scalar(Path::of(parent), key, value)
    }

    /// `{key1:val1,key2:{val2A,val2B},key3:{}}` stored at the root.
    fn sample_table() -> MemoryTable {
        let table = MemoryTable::new();
        let mut txn = table.write();
        for row in [
            complex(&[], "", 1),
            scalar(&[1], "key1", "val1"),
            complex(&[1], "key2", 1),
            complex(&[1], "key3", 2),
            scalar(&[1, 1], "1", "val2A"),
            scalar(&[1, 1], "2", "val2B"),
        ] {
            txn.insert(row).unwrap();
        }
        txn.mark_commit();
        drop(txn);
        table
    }

    fn keys(rows: RowIter<'_>) -> Vec<String> {
        rows.map(|r| r.key().to_string()).collect()
    }

    #[test]
    fn test_select_single() {
        let table = sample_table();
        let txn = table.read();
        assert_eq!(
            txn.select_single(&Path::of(&[1]), "key1").unwrap(),
            Some(scalar(&[1], "key1", "val1"))
        );
        assert_eq!(txn.select_single(&Path::of(&[1]), "KEY1").unwrap(), None);
    }

    #[test]
    fn test_select_all_in_storage_order() {
        let table = sample_table();
        let txn = table.read();
        let rows: Vec<String> = txn.select_all().unwrap().map(|r| r.encode()).collect();
        assert_eq!(
            rows,
            vec![
                "\t\t1\t",
                "1\tkey1\t\tval1",
                "1\tkey2\t1\t",
                "1\tkey3\t2\t",
                "11\t1\t\tval2A",
                "11\t2\t\tval2B",
            ]
        );
    }

    #[test]
    fn test_select_children() {
        let table = sample_table();
        let txn = table.read();
        assert_eq!(
            keys(txn.select_children(&Path::of(&[1])).unwrap()),
            vec!["key1", "key2", "key3"]
        );
        assert!(keys(txn.select_children(&Path::of(&[1, 2])).unwrap()).is_empty());
    }

    #[test]
    fn test_select_descendants_depth_first() {
        let table = sample_table();
        let txn = table.read();
        assert_eq!(
            keys(txn.select_descendants(&Path::of(&[1])).unwrap()),
            vec!["key1", "key2", "1", "2", "key3"]
        );
    }

    #[test]
    fn test_duplicate_insert() {
        let table = sample_table();
        let mut txn = table.write();
        let err = txn.insert(scalar(&[1], "key1", "other")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRow { .. }));
    }

    #[test]
    fn test_uncommitted_write_is_discarded() {
        let table = sample_table();
        {
            let mut txn = table.write();
            txn.delete_all().unwrap();
        }
        assert_eq!(table.row_count(), 6);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let table = sample_table();
        let before = table.read();

        let mut txn = table.write();
        txn.delete_descendants(&Path::of(&[1])).unwrap();
        txn.mark_commit();
        Box::new(txn).close().unwrap();

        assert_eq!(before.select_all().unwrap().count(), 6);
        assert_eq!(table.read().select_all().unwrap().count(), 1);
    }

    #[test]
    fn test_delete_descendants() {
        let table = sample_table();
        let mut txn = table.write();
        assert_eq!(txn.delete_descendants(&Path::of(&[1, 1])).unwrap(), 2);
        assert!(txn.delete_single(&Path::of(&[1]), "key2").unwrap());
        assert!(!txn.delete_single(&Path::of(&[1]), "key2").unwrap());
        assert_eq!(
            keys(txn.select_descendants(&Path::of(&[1])).unwrap()),
            vec!["key1", "key3"]
        );
    }

    #[test]
    fn test_deleting_subtrees_forgets_their_marks() {
        let table = MemoryTable::new();
        for _ in 0..100 {
            let mut txn = table.write();
            let root = Path::root();
            if let Some(old) = txn.select_single(&root, "").unwrap() {
                txn.delete_single(&root, "").unwrap();
                txn.delete_descendants(&old.fullpath().unwrap()).unwrap();
            }
            let top = txn.allocate_suffix(&root).unwrap();
            txn.insert(Row::complex(root.clone(), "", top).unwrap()).unwrap();
            txn.insert(complex(&[top], "a", 1)).unwrap();
            txn.insert(scalar(&[top, 1], "b", "1")).unwrap();
            txn.mark_commit();
        }

        let snapshot = table.current.read().clone();
        assert_eq!(snapshot.rows.len(), 3);
        // the empty path and the live root keep their marks
        assert_eq!(snapshot.suffix_marks.len(), 2);
        assert_eq!(snapshot.suffix_marks.get(&Path::root()), Some(&100));
    }

    #[test]
    fn test_delete_descendants_keeps_parent_mark() {
        let table = sample_table();
        let mut txn = table.write();
        let parent = Path::of(&[1]);
        txn.delete_descendants(&parent).unwrap();
        assert_eq!(txn.allocate_suffix(&parent).unwrap(), 3);
    }

    #[test]
    fn test_allocate_suffix_never_reuses() {
        let table = sample_table();
        let mut txn = table.write();
        let parent = Path::of(&[1]);

        assert_eq!(txn.allocate_suffix(&parent).unwrap(), 3);
        assert!(txn.delete_single(&parent, "key3").unwrap());
        assert_eq!(txn.allocate_suffix(&parent).unwrap(), 4);
        assert_eq!(txn.allocate_suffix(&Path::of(&[9])).unwrap(), 1);

        txn.delete_all().unwrap();
        assert_eq!(txn.allocate_suffix(&parent).unwrap(), 1);
    }
}
