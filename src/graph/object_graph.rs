//! Lazily synchronized tree of nodes, one per visited reference.
//!
//! Every node caches the value at its reference. A write stores the new value
//! in its node only, then records what the rest of the graph owes:
//!
//! - ancestors are marked [`CacheState::NeedsChildRebuild`] and the path to
//!   them is flagged modified, so the next read of an ancestor folds the new
//!   value in;
//! - descendants are marked [`CacheState::NeedsParentRefresh`], so the next
//!   read of a descendant pulls its value out of the new one.
//!
//! Both walks stop at nodes that are already marked, so a write costs the
//! number of nodes whose state actually changes.
//!
//! A node marked `NeedsParentRefresh` only has descendants with the same
//! mark. Reads rely on this: after a refresh, the chain from the root to the
//! node holds no pending refresh.

use crate::error::{AccessError, Result, StoreError};
use crate::reference::Reference;
use crate::store::{shallow, Entry};
use crate::types::Value;
use std::collections::HashMap;

/// Index of a node in the graph's arena.
pub type NodeId = usize;

/// The root node, always present.
pub const ROOT: NodeId = 0;

/// Whether a node's cached value can be used as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    Fresh,
    /// The cached value is stale; the parent's value is authoritative.
    NeedsParentRefresh,
    /// Some modified children must be folded into the cached value.
    NeedsChildRebuild,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    /// Part of the reference leading here from the parent. `None` at the root.
    key: Option<Value>,
    value: Option<Value>,
    state: CacheState,
    /// Written since the parent last folded this node in.
    modified: bool,
    children: HashMap<Value, NodeId>,
}

impl Node {
    fn new(parent: Option<NodeId>, key: Option<Value>, value: Option<Value>, state: CacheState) -> Self {
        Self {
            parent,
            key,
            value,
            state,
            modified: false,
            children: HashMap::new(),
        }
    }
}

/// Arena of nodes addressed by [`NodeId`]. Nodes are never removed.
#[derive(Debug)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
}

impl ObjectGraph {
    /// A graph whose root holds `value`.
    pub fn new(value: Option<Value>) -> Self {
        Self {
            nodes: vec![Node::new(None, None, value, CacheState::Fresh)],
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// `None` for an unknown id.
    pub fn state(&self, id: NodeId) -> Option<CacheState> {
        self.nodes.get(id).map(|node| node.state)
    }

    pub fn is_modified(&self, id: NodeId) -> Option<bool> {
        self.nodes.get(id).map(|node| node.modified)
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id < self.nodes.len() {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfBounds {
                index: id,
                count: self.nodes.len(),
            })
        }
    }

    /// The child of `parent` under `key`, created on first use.
    pub fn child(&mut self, parent: NodeId, key: &Value) -> Result<NodeId> {
        self.check(parent)?;
        Ok(self.child_of(parent, key))
    }

    fn child_of(&mut self, parent: NodeId, key: &Value) -> NodeId {
        if let Some(&id) = self.nodes[parent].children.get(key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::new(
            Some(parent),
            Some(key.clone()),
            None,
            CacheState::NeedsParentRefresh,
        ));
        self.nodes[parent].children.insert(key.clone(), id);
        id
    }

    /// The node for `reference`, creating missing nodes along the way.
    pub fn lookup(&mut self, reference: &Reference) -> NodeId {
        reference
            .parts()
            .into_iter()
            .fold(ROOT, |id, part| self.child_of(id, part))
    }

    /// The current value of node `id`.
    pub fn read(&mut self, id: NodeId) -> Result<Option<Value>> {
        self.check(id)?;
        self.refresh(id);
        if self.nodes[id].state == CacheState::NeedsChildRebuild {
            self.rebuild(id)?;
        }
        Ok(self.nodes[id].value.clone())
    }

    /// Store `value` at node `id`. The parent must hold a complex value.
    pub fn write(&mut self, id: NodeId, value: Option<Value>) -> Result<()> {
        self.check(id)?;
        if let Some(parent) = self.nodes[id].parent {
            self.ensure_complex(parent)?;
        }
        self.mark_ancestors(id);
        self.invalidate_descendants(id);

        let node = &mut self.nodes[id];
        node.value = value;
        node.state = CacheState::Fresh;
        Ok(())
    }

    /// Entries of the complex value at `id`, complex children emptied.
    pub fn browse(&mut self, id: NodeId) -> Result<Vec<Entry>> {
        match self.read(id)? {
            None => Err(AccessError::BrowseNonExisting.into()),
            Some(Value::Complex(complex)) => Ok(complex
                .iter()
                .map(|(k, v)| (k.clone(), shallow(v)))
                .collect()),
            Some(_) => Err(AccessError::BrowseNonComplex.into()),
        }
    }

    fn ensure_complex(&mut self, id: NodeId) -> Result<()> {
        match self.read(id)? {
            None => Err(AccessError::WriteNonExisting.into()),
            Some(value) if value.is_complex() => Ok(()),
            Some(_) => Err(AccessError::WriteNonComplex.into()),
        }
    }

    /// Pull values down from the nearest fresh ancestor to `id`.
    fn refresh(&mut self, id: NodeId) {
        let mut chain = Vec::new();
        let mut current = id;
        while self.nodes[current].state == CacheState::NeedsParentRefresh {
            match self.nodes[current].parent {
                Some(parent) => {
                    chain.push(current);
                    current = parent;
                }
                None => {
                    self.nodes[current].state = CacheState::Fresh;
                    break;
                }
            }
        }

        for &node in chain.iter().rev() {
            let value = match (self.nodes[node].parent, &self.nodes[node].key) {
                (Some(parent), Some(key)) => self.nodes[parent]
                    .value
                    .as_ref()
                    .and_then(Value::as_complex)
                    .and_then(|complex| complex.get(key))
                    .cloned(),
                _ => None,
            };
            let node = &mut self.nodes[node];
            node.value = value;
            node.state = CacheState::Fresh;
        }
    }

    /// Fold modified children into `id`, deepest pending nodes first.
    fn rebuild(&mut self, id: NodeId) -> Result<()> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.nodes[current].children.values().copied().filter(|&child| {
                let node = &self.nodes[child];
                node.modified && node.state == CacheState::NeedsChildRebuild
            }));
        }
        // reversed pre-order visits every node after its descendants
        for &current in order.iter().rev() {
            self.fold_children(current)?;
        }
        Ok(())
    }

    fn fold_children(&mut self, id: NodeId) -> Result<()> {
        let mut complex = match self.nodes[id].value.take() {
            Some(Value::Complex(complex)) => complex,
            other => {
                self.nodes[id].value = other;
                return Err(StoreError::Corruption(
                    "child rebuild pending on a non-complex value".into(),
                ));
            }
        };

        let modified: Vec<NodeId> = self.nodes[id]
            .children
            .values()
            .copied()
            .filter(|&child| self.nodes[child].modified)
            .collect();
        for child in modified {
            let node = &mut self.nodes[child];
            node.modified = false;
            if let Some(key) = node.key.clone() {
                complex = complex.put_opt(key, node.value.clone());
            }
        }

        let node = &mut self.nodes[id];
        node.value = Some(Value::Complex(complex));
        node.state = CacheState::Fresh;
        Ok(())
    }

    /// Flag `id` and its ancestors, up to the first ancestor already pending
    /// a rebuild.
    fn mark_ancestors(&mut self, id: NodeId) {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            self.nodes[current].modified = true;
            if self.nodes[parent].state == CacheState::NeedsChildRebuild {
                break;
            }
            self.nodes[parent].state = CacheState::NeedsChildRebuild;
            current = parent;
        }
    }

    /// Drop cached values below `id`, skipping subtrees already invalidated.
    fn invalidate_descendants(&mut self, id: NodeId) {
        let mut stack: Vec<NodeId> = self.nodes[id].children.values().copied().collect();
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            if node.state == CacheState::NeedsParentRefresh {
                continue;
            }
            node.value = None;
            node.state = CacheState::NeedsParentRefresh;
            node.modified = false;
            stack.extend(node.children.values().copied());
        }
    }
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new(None)
    }
}
