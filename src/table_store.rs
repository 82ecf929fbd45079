//! A [`Store`] backed by a row table.
//!
//! Layout: the root value lives in the row `(parent = [], key = "")`. A
//! complex value stored in a row with suffix `s` keeps its entries in rows
//! whose parent is `row.parent + [s]`, one row per entry, keyed by the text
//! form of the entry key. Scalars are stored as their text form.
//!
//! ```text
//! {key1:val1,key2:{val2A,val2B}}
//!
//! parent  key   suffix value
//! []      ""    1
//! [1]     key1         val1
//! [1]     key2  1
//! [1,1]   1            val2A
//! [1,1]   2            val2B
//! ```

use crate::builder::{TreeBuilder, TreeHandler};
use crate::codec::{generate, parse};
use crate::error::{AccessError, Result, StoreError};
use crate::reference::Reference;
use crate::rows::{Database, Path, Row, RowContent, RowRead, RowWrite};
use crate::store::{Entry, Store};
use crate::types::{Complex, Value};
use std::sync::Arc;

/// Key of the root row.
const ROOT_KEY: &str = "";

/// Maps reference-addressed operations onto a [`Database`].
pub struct RowTableStore {
    db: Arc<dyn Database>,
}

impl RowTableStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

impl Store for RowTableStore {
    fn read(&self, reference: &Reference) -> Result<Option<Value>> {
        let txn = self.db.open_read()?;
        let row = match locate(&*txn, reference)? {
            Some(row) => row,
            None => {
                tracing::trace!(?reference, "read found nothing");
                return Ok(None);
            }
        };
        let value = match row.content() {
            RowContent::Scalar(text) => parse(text)?,
            RowContent::Complex(_) => collect_descendants(&*txn, &row)?,
        };
        tracing::trace!(?reference, "read");
        Ok(Some(value))
    }

    fn write(&self, reference: &Reference, value: Option<Value>) -> Result<()> {
        let mut txn = self.db.open_write()?;
        let (parent, key, target) = resolve_target(&*txn, reference)?;

        let mut deleted = 0;
        if let Some(row) = target {
            if txn.delete_single(row.parent(), row.key())? {
                deleted += 1;
            }
            if let Some(path) = row.fullpath() {
                deleted += txn.delete_descendants(&path)?;
            }
        }

        let inserted = match value {
            None => 0,
            Some(Value::Complex(complex)) => {
                let suffix = txn.allocate_suffix(&parent)?;
                insert_subtree(&mut *txn, parent, key, suffix, complex)?
            }
            Some(scalar) => {
                txn.insert(Row::scalar(parent, key, generate(&scalar)))?;
                1
            }
        };

        txn.mark_commit();
        txn.close()?;
        tracing::debug!(?reference, deleted, inserted, "write committed");
        Ok(())
    }

    fn browse(&self, reference: &Reference) -> Result<Vec<Entry>> {
        let txn = self.db.open_read()?;
        let row = locate(&*txn, reference)?.ok_or(AccessError::BrowseNonExisting)?;
        let path = row.fullpath().ok_or(AccessError::BrowseNonComplex)?;

        // collect into a complex value so entries come back in value order,
        // not in the text order of their keys
        let mut children = Complex::new();
        for child in txn.select_children(&path)? {
            let key = parse(child.key())?;
            let value = match child.content() {
                RowContent::Complex(_) => Value::Complex(Complex::new()),
                RowContent::Scalar(text) => parse(text)?,
            };
            children = children.put(key, value);
        }
        tracing::trace!(?reference, children = children.len(), "browse");
        Ok(children.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn database(&self) -> Option<Arc<dyn Database>> {
        Some(self.db.clone())
    }
}

fn root_row<T: RowRead + ?Sized>(txn: &T) -> Result<Option<Row>> {
    txn.select_single(&Path::root(), ROOT_KEY)
}

/// The row stored at `reference`. Walking through a scalar finds nothing.
fn locate<T: RowRead + ?Sized>(txn: &T, reference: &Reference) -> Result<Option<Row>> {
    let mut current = root_row(txn)?;
    for part in reference.parts() {
        let path = match current.as_ref().and_then(Row::fullpath) {
            Some(path) => path,
            None => return Ok(None),
        };
        current = txn.select_single(&path, &generate(part))?;
    }
    Ok(current)
}

/// The address `reference` is stored at, and the row currently there.
///
/// Only a scalar directly above the target is `WriteNonComplex`; a scalar
/// further up means the parent does not exist.
fn resolve_target<T: RowRead + ?Sized>(
    txn: &T,
    reference: &Reference,
) -> Result<(Path, String, Option<Row>)> {
    let parts = reference.parts();
    let mut parent = Path::root();
    let mut key = ROOT_KEY.to_string();
    let mut current = root_row(txn)?;
    for (i, part) in parts.iter().enumerate() {
        let row = current.ok_or(AccessError::WriteNonExisting)?;
        parent = match row.fullpath() {
            Some(path) => path,
            None if i + 1 == parts.len() => return Err(AccessError::WriteNonComplex.into()),
            None => return Err(AccessError::WriteNonExisting.into()),
        };
        key = generate(part);
        current = txn.select_single(&parent, &key)?;
    }
    Ok((parent, key, current))
}

/// Rebuild the complex value stored in `base` from its descendant rows.
///
/// Rows arrive in depth-first order. The depth of each row relative to the
/// previous one tells how many nodes to close before it is emitted.
fn collect_descendants<T: RowRead + ?Sized>(txn: &T, base: &Row) -> Result<Value> {
    let base_path = base
        .fullpath()
        .ok_or_else(|| StoreError::Corruption(format!("not a complex row: {}", base)))?;

    let mut builder = TreeBuilder::new();
    builder.open(Value::text(ROOT_KEY));
    let mut previous = base_path.clone();
    for row in txn.select_descendants(&base_path)? {
        let current = row.effective_path();
        let common = current.prefix_len(&previous);
        for _ in common..previous.len() {
            builder.close()?;
        }
        let key = parse(row.key())?;
        match row.content() {
            RowContent::Complex(_) => builder.open(key),
            RowContent::Scalar(text) => builder.value(key, parse(text)?),
        }
        previous = current;
    }
    for _ in base_path.len()..previous.len() {
        builder.close()?;
    }
    builder.close()?;

    builder
        .finish()?
        .ok_or_else(|| StoreError::Corruption(format!("empty reconstruction of {}", base)))
}

/// Insert `value` as a complex row at `(parent, key)` with `suffix`, and all
/// of its entries below it. Returns the number of rows inserted.
fn insert_subtree<T: RowWrite + ?Sized>(
    txn: &mut T,
    parent: Path,
    key: String,
    suffix: u32,
    value: Complex,
) -> Result<usize> {
    let mut inserted = 0;
    let mut pending = vec![(parent, key, suffix, value)];
    while let Some((parent, key, suffix, value)) = pending.pop() {
        let path = parent.add(suffix);
        txn.insert(Row::complex(parent, key, suffix)?)?;
        inserted += 1;

        // the path is fresh, so child suffixes can be numbered from 1
        let mut next_suffix = 0;
        for (entry_key, entry_value) in value.iter() {
            match entry_value {
                Value::Complex(child) => {
                    next_suffix += 1;
                    pending.push((path.clone(), generate(entry_key), next_suffix, child.clone()));
                }
                scalar => {
                    txn.insert(Row::scalar(path.clone(), generate(entry_key), generate(scalar)))?;
                    inserted += 1;
                }
            }
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::MemoryTable;

    fn store() -> (Arc<MemoryTable>, RowTableStore) {
        let table = Arc::new(MemoryTable::new());
        let store = RowTableStore::new(table.clone());
        (table, store)
    }

    fn rows(table: &MemoryTable) -> Vec<String> {
        table
            .read()
            .select_all()
            .unwrap()
            .map(|r| r.to_string())
            .collect()
    }

    fn sample() -> Value {
        Value::Complex(
            Complex::new().put("key1", "val1").put(
                "key2",
                Complex::list(vec![Value::text("val2A"), Value::text("val2B")]),
            ),
        )
    }

    #[test]
    fn test_write_layout() {
        let (table, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();

        assert_eq!(
            rows(&table),
            vec![
                "parent=[], key=, suffix=1, value=",
                "parent=[1], key=key1, suffix=, value=val1",
                "parent=[1], key=key2, suffix=1, value=",
                "parent=[1, 1], key=1, suffix=, value=val2A",
                "parent=[1, 1], key=2, suffix=, value=val2B",
            ]
        );
    }

    #[test]
    fn test_read_round_trip() {
        let (_, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();

        assert_eq!(store.read(&Reference::root()).unwrap(), Some(sample()));
        assert_eq!(
            store.read(&Reference::from_parts(["key2"])).unwrap(),
            Some(Value::Complex(Complex::list(vec![
                Value::text("val2A"),
                Value::text("val2B")
            ])))
        );
        assert_eq!(
            store.read(&Reference::from_parts(vec![Value::text("key2"), Value::number(2)])).unwrap(),
            Some(Value::text("val2B"))
        );
    }

    #[test]
    fn test_read_through_scalar_is_missing() {
        let (_, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();
        assert_eq!(store.read(&Reference::from_parts(["key1", "x"])).unwrap(), None);
        assert_eq!(store.read(&Reference::from_parts(["nope"])).unwrap(), None);
    }

    #[test]
    fn test_read_empty_table() {
        let (_, store) = store();
        assert_eq!(store.read(&Reference::root()).unwrap(), None);
    }

    #[test]
    fn test_replace_complex_allocates_fresh_suffix() {
        let (table, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();
        store
            .write(
                &Reference::from_parts(["key2"]),
                Some(Value::Complex(Complex::new().put("x", 1))),
            )
            .unwrap();

        let rows = rows(&table);
        assert!(rows.contains(&"parent=[1], key=key2, suffix=2, value=".to_string()));
        assert!(rows.contains(&"parent=[1, 2], key=x, suffix=, value=1".to_string()));
        assert!(!rows.iter().any(|r| r.starts_with("parent=[1, 1]")));
    }

    #[test]
    fn test_collect_handles_empty_and_nested_complex() {
        let (_, store) = store();
        let value = Value::Complex(
            Complex::new()
                .put("a", Complex::new().put("b", Complex::new().put("c", 1)).put("d", 2))
                .put("e", Complex::new())
                .put("f", "g"),
        );
        store.write(&Reference::root(), Some(value.clone())).unwrap();
        assert_eq!(store.read(&Reference::root()).unwrap(), Some(value));
    }

    #[test]
    fn test_browse_is_shallow() {
        let (_, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();
        assert_eq!(
            store.browse(&Reference::root()).unwrap(),
            vec![
                (Value::text("key1"), Value::text("val1")),
                (Value::text("key2"), Value::empty()),
            ]
        );
    }

    #[test]
    fn test_browse_orders_by_value() {
        let (_, store) = store();
        let list = Complex::list((1..=11).map(Value::number));
        store.write(&Reference::root(), Some(Value::Complex(list))).unwrap();

        let keys: Vec<Value> = store
            .browse(&Reference::root())
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, (1..=11).map(Value::number).collect::<Vec<_>>());
    }

    #[test]
    fn test_access_errors() {
        let (_, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();

        let err = store
            .write(&Reference::from_parts(["missing", "x"]), Some(Value::number(1)))
            .unwrap_err();
        assert_eq!(err.access(), Some(AccessError::WriteNonExisting));

        let err = store
            .write(&Reference::from_parts(["key1", "x"]), Some(Value::number(1)))
            .unwrap_err();
        assert_eq!(err.access(), Some(AccessError::WriteNonComplex));

        let err = store.browse(&Reference::from_parts(["key1"])).unwrap_err();
        assert_eq!(err.access(), Some(AccessError::BrowseNonComplex));

        let err = store.browse(&Reference::from_parts(["missing"])).unwrap_err();
        assert_eq!(err.access(), Some(AccessError::BrowseNonExisting));
    }

    #[test]
    fn test_write_deep_below_scalar_is_non_existing() {
        let (_, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();

        let err = store
            .write(&Reference::from_parts(["key1", "x", "y"]), Some(Value::number(1)))
            .unwrap_err();
        assert_eq!(err.access(), Some(AccessError::WriteNonExisting));
    }

    #[test]
    fn test_failed_write_leaves_table_untouched() {
        let (table, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();
        let before = rows(&table);

        assert!(store
            .write(&Reference::from_parts(["key1", "x"]), None)
            .is_err());
        assert_eq!(rows(&table), before);
    }

    #[test]
    fn test_delete_cascades() {
        let (table, store) = store();
        store.write(&Reference::root(), Some(sample())).unwrap();
        store.write(&Reference::from_parts(["key2"]), None).unwrap();

        assert_eq!(
            rows(&table),
            vec![
                "parent=[], key=, suffix=1, value=",
                "parent=[1], key=key1, suffix=, value=val1",
            ]
        );

        store.write(&Reference::root(), None).unwrap();
        assert!(rows(&table).is_empty());
    }
}
