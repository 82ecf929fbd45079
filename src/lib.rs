//! # Reference tree store
//!
//! A hierarchical store of immutable values addressed by references.
//!
//! ## Core Concepts
//!
//! - **Values**: numbers, text, binary, references and ordered maps called
//!   complex values, with a canonical text form
//! - **References**: sequences of parts naming a location in the tree
//! - **Stores**: `read`, `write` and `browse` by reference, over two kinds
//!   of backend
//! - **Row tables**: the tree flattened into rows addressed by integer paths,
//!   with snapshot transactions
//! - **Object graph**: one lazily synchronized node per visited reference
//!
//! ## Example
//!
//! ```ignore
//! use reftree::{Complex, Reference, StoreRegistry, Value};
//!
//! let registry = StoreRegistry::new();
//! let store = registry.open("memorydb:example")?;
//!
//! let value = Complex::new()
//!     .put("key1", "val1")
//!     .put("key2", Complex::list(vec![Value::text("val2A"), Value::text("val2B")]));
//! store.write(&Reference::root(), Some(value.into()))?;
//!
//! let leaf = store.read(&Reference::from_parts(["key2"]).child(2))?;
//! assert_eq!(leaf, Some(Value::text("val2B")));
//! ```

pub mod admin;
pub mod builder;
pub mod codec;
pub mod error;
pub mod graph;
pub mod reference;
pub mod registry;
pub mod rows;
pub mod store;
pub mod table_store;
pub mod types;

// Re-exports
pub use builder::{TreeBuilder, TreeHandler};
pub use codec::{generate, generate_with, parse, Format};
pub use error::{AccessError, Result, StoreError};
pub use graph::{CacheState, FileStore, FileStoreConfig, MemoryStore, ObjectGraph};
pub use reference::Reference;
pub use registry::{
    FileStoreProvider, MemoryStoreProvider, MemoryTableProvider, StoreProvider, StoreRegistry,
};
pub use rows::{Database, MemoryTable, Path, Row, RowContent, RowRead, RowTransaction, RowWrite};
pub use store::{Entry, Store};
pub use table_store::RowTableStore;
pub use types::{Complex, Kind, Number, Value};
