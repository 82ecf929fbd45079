//! In-memory store over an [`ObjectGraph`].

use crate::error::Result;
use crate::graph::object_graph::ObjectGraph;
use crate::reference::Reference;
use crate::store::{Entry, Store};
use crate::types::Value;
use parking_lot::Mutex;

/// A store kept entirely in memory.
///
/// The graph is not synchronized itself; every operation holds the store's
/// mutex for its whole duration.
#[derive(Default)]
pub struct MemoryStore {
    graph: Mutex<ObjectGraph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose root initially holds `value`.
    pub fn with_value(value: Option<Value>) -> Self {
        Self {
            graph: Mutex::new(ObjectGraph::new(value)),
        }
    }

    /// Number of graph nodes created so far.
    pub fn node_count(&self) -> usize {
        self.graph.lock().node_count()
    }
}

impl Store for MemoryStore {
    fn read(&self, reference: &Reference) -> Result<Option<Value>> {
        let mut graph = self.graph.lock();
        let id = graph.lookup(reference);
        tracing::trace!(?reference, node = id, "read");
        graph.read(id)
    }

    fn write(&self, reference: &Reference, value: Option<Value>) -> Result<()> {
        let mut graph = self.graph.lock();
        let id = graph.lookup(reference);
        graph.write(id, value)?;
        tracing::trace!(?reference, node = id, "write");
        Ok(())
    }

    fn browse(&self, reference: &Reference) -> Result<Vec<Entry>> {
        let mut graph = self.graph.lock();
        let id = graph.lookup(reference);
        tracing::trace!(?reference, node = id, "browse");
        graph.browse(id)
    }
}
