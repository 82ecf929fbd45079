//! Property tests for encodings and store round trips.

use proptest::prelude::*;
use reftree::{
    generate_with, parse, Complex, Format, MemoryStore, MemoryTable, Number, Path, Reference,
    RowRead, RowTableStore, Store, Value,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn arb_key() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-50_i64..50).prop_map(Value::number),
        "[a-zA-Z_][a-zA-Z0-9_]{0,6}".prop_map(Value::text),
        "[a-z \t\"\\\\]{0,5}".prop_map(Value::text),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1_000_i64..1_000).prop_map(Value::number),
        (-1e6_f64..1e6).prop_filter_map("finite", |f| Number::new(f).map(Value::Number)),
        "[a-zA-Z0-9 _\"\\\\\t\n]{0,8}".prop_map(Value::text),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Value::binary),
        prop::collection::vec(arb_key(), 0..3)
            .prop_map(|parts| Value::Reference(Reference::from_parts(parts))),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(4, 48, 6, |inner| {
        prop::collection::btree_map(arb_key(), inner, 0..6).prop_map(|entries: BTreeMap<Value, Value>| {
            Value::Complex(entries.into_iter().collect::<Complex>())
        })
    })
}

fn arb_complex() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..6)
        .prop_map(|entries| Value::Complex(entries.into_iter().collect::<Complex>()))
}

// --- Path Encoding ---

#[test]
fn test_path_codec_boundaries() {
    let boundaries = [0, 9, 10, 35, 36, 37, 63, 64, 0xFFF, 0x1000, 0xFFFF_FFFF];
    for &part in &boundaries {
        let path = Path::of(&[part]);
        assert_eq!(Path::decode(&path.encode()).unwrap(), path, "part {}", part);
    }
    let all = Path::of(&boundaries);
    assert_eq!(Path::decode(&all.encode()).unwrap(), all);
}

proptest! {
    #[test]
    fn prop_path_codec_round_trip(parts in prop::collection::vec(any::<u32>(), 0..8)) {
        let path = Path::of(&parts);
        prop_assert_eq!(Path::decode(&path.encode()).unwrap(), path);
    }

    #[test]
    fn prop_short_parts_keep_order(a in prop::collection::vec(0_u32..=36, 0..5), b in prop::collection::vec(0_u32..=36, 0..5)) {
        let (a, b) = (Path::of(&a), Path::of(&b));
        prop_assert_eq!(a.cmp(&b), a.encode().cmp(&b.encode()));
    }

    // --- Text Form ---

    #[test]
    fn prop_codec_round_trip(value in arb_value()) {
        for format in [Format::Compact, Format::Pretty, Format::Indent] {
            let text = generate_with(&value, format);
            prop_assert_eq!(parse(&text).unwrap(), value.clone());
        }
    }

    // --- Stores ---

    #[test]
    fn prop_memory_store_round_trip(value in arb_value()) {
        let store = MemoryStore::new();
        store.write(&Reference::root(), Some(value.clone())).unwrap();
        prop_assert_eq!(store.read(&Reference::root()).unwrap(), Some(value));
    }

    #[test]
    fn prop_row_table_round_trip(value in arb_value()) {
        let store = RowTableStore::new(Arc::new(MemoryTable::new()));
        store.write(&Reference::root(), Some(value.clone())).unwrap();
        prop_assert_eq!(store.read(&Reference::root()).unwrap(), Some(value));
    }

    #[test]
    fn prop_child_writes_agree(base in arb_complex(), key in arb_key(), child in arb_value()) {
        let memory = MemoryStore::new();
        let table = RowTableStore::new(Arc::new(MemoryTable::new()));
        let reference = Reference::root().child(key);
        for store in [&memory as &dyn Store, &table] {
            store.write(&Reference::root(), Some(base.clone())).unwrap();
            store.write(&reference, Some(child.clone())).unwrap();
        }
        prop_assert_eq!(memory.read(&Reference::root()).unwrap(), table.read(&Reference::root()).unwrap());
        prop_assert_eq!(memory.read(&reference).unwrap(), Some(child));
    }

    #[test]
    fn prop_descendants_are_pre_order(value in arb_complex()) {
        let table = Arc::new(MemoryTable::new());
        let store = RowTableStore::new(table.clone());
        store.write(&Reference::root(), Some(value)).unwrap();

        let txn = table.read();
        let rows: Vec<_> = txn.select_descendants(&Path::of(&[1])).unwrap().collect();
        let total = txn.select_all().unwrap().count();
        prop_assert_eq!(rows.len() + 1, total);

        // every row's parent is the base or a complex row seen earlier
        let mut open = vec![Path::of(&[1])];
        for row in &rows {
            prop_assert!(open.contains(row.parent()), "row before its parent: {}", row);
            if let Some(path) = row.fullpath() {
                open.push(path);
            }
        }
        // and effective paths never go backwards
        for pair in rows.windows(2) {
            let (a, b) = (pair[0].effective_path(), pair[1].effective_path());
            prop_assert!(a <= b, "{} after {}", b, a);
        }
    }
}
