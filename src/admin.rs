//! Export and import of row tables in the line format of [`Row::encode`].

use crate::error::{Result, StoreError};
use crate::rows::{Database, Row};
use crate::store::Store;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

fn database(store: &dyn Store) -> Result<Arc<dyn Database>> {
    store.database().ok_or(StoreError::NotRowTable)
}

/// Write every row of the store's table to `writer`, one line each, in
/// storage order. Returns the number of rows written.
pub fn export_rows<W: Write>(store: &dyn Store, mut writer: W) -> Result<u64> {
    let db = database(store)?;
    let txn = db.open_read()?;
    let mut count = 0;
    for row in txn.select_all()? {
        writeln!(writer, "{}", row.encode())?;
        count += 1;
    }
    writer.flush()?;
    tracing::debug!(rows = count, "exported rows");
    Ok(count)
}

/// Replace the store's table with the rows read from `reader`.
///
/// Nothing changes unless every line decodes and inserts.
pub fn import_rows<R: BufRead>(store: &dyn Store, reader: R) -> Result<u64> {
    let db = database(store)?;
    let mut txn = db.open_write()?;
    txn.delete_all()?;
    let mut count = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        txn.insert(Row::decode(line)?)?;
        count += 1;
    }
    txn.mark_commit();
    txn.close()?;
    tracing::debug!(rows = count, "imported rows");
    Ok(count)
}

/// [`export_rows`] into a file, creating its directory if needed.
pub fn export_file(store: &dyn Store, path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    export_rows(store, BufWriter::new(File::create(path)?))
}

/// [`import_rows`] from a file.
pub fn import_file(store: &dyn Store, path: impl AsRef<Path>) -> Result<u64> {
    import_rows(store, BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryStore;
    use crate::reference::Reference;
    use crate::rows::MemoryTable;
    use crate::table_store::RowTableStore;
    use crate::types::{Complex, Value};

    fn table_store() -> RowTableStore {
        RowTableStore::new(Arc::new(MemoryTable::new()))
    }

    #[test]
    fn test_export() {
        let store = table_store();
        let value = Value::Complex(Complex::new().put("key1", "val1"));
        store.write(&Reference::root(), Some(value)).unwrap();

        let mut out = Vec::new();
        assert_eq!(export_rows(&store, &mut out).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "\t\t1\t\n1\tkey1\t\tval1\n");
    }

    #[test]
    fn test_import_replaces_rows() {
        let store = table_store();
        store.write(&Reference::root(), Some(Value::text("old"))).unwrap();

        let input = "\t\t1\t\r\n1\tkey1\t\tval1\n";
        assert_eq!(import_rows(&store, input.as_bytes()).unwrap(), 2);
        assert_eq!(
            store.read(&Reference::root()).unwrap(),
            Some(Value::Complex(Complex::new().put("key1", "val1")))
        );
    }

    #[test]
    fn test_failed_import_changes_nothing() {
        let store = table_store();
        store.write(&Reference::root(), Some(Value::text("old"))).unwrap();

        let input = "\t\t1\t\nnot a row\n";
        let err = import_rows(&store, input.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow(_)));
        assert_eq!(store.read(&Reference::root()).unwrap(), Some(Value::text("old")));
    }

    #[test]
    fn test_not_a_row_table() {
        let store = MemoryStore::new();
        assert!(matches!(
            export_rows(&store, Vec::new()),
            Err(StoreError::NotRowTable)
        ));
        assert!(matches!(
            import_rows(&store, "".as_bytes()),
            Err(StoreError::NotRowTable)
        ));
    }
}
