//! Object-graph backends: the lazy node graph and the stores built on it.

mod file_store;
mod memory_store;
mod object_graph;

pub use file_store::{FileStore, FileStoreConfig};
pub use memory_store::MemoryStore;
pub use object_graph::{CacheState, NodeId, ObjectGraph, ROOT};
