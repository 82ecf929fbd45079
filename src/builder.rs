//! Reconstruction of nested values from a flat open/value/close stream.
//!
//! Producers (the row-table reader, the text parser) walk a tree in
//! depth-first order and report it as events. [`TreeBuilder`] folds the
//! events back into [`Value`]s with a frame stack whose buffers are reused
//! across pushes, so wide and deep trees cost one allocation per level.

use crate::error::{Result, StoreError};
use crate::types::{Complex, Value};

/// Receiver of a depth-first value stream.
pub trait TreeHandler {
    /// Start a complex value stored under `key` in the enclosing node.
    fn open(&mut self, key: Value);

    /// Add a leaf entry to the innermost open node.
    fn value(&mut self, key: Value, value: Value);

    /// Finish the innermost open node.
    fn close(&mut self) -> Result<()>;
}

#[derive(Default)]
struct Frame {
    key: Option<Value>,
    entries: Vec<(Value, Value)>,
}

/// Collects a depth-first event stream into a value.
///
/// The builder starts with one implicit top-level frame. Whatever is
/// emitted first at the top level is the result of [`TreeBuilder::finish`].
pub struct TreeBuilder {
    frames: Vec<Frame>,
    /// Number of active frames, including the top-level one.
    active: usize,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
            active: 1,
        }
    }

    /// Number of currently open nodes.
    pub fn depth(&self) -> usize {
        self.active - 1
    }

    /// The first top-level value, or `None` if nothing was emitted.
    pub fn finish(mut self) -> Result<Option<Value>> {
        if self.active != 1 {
            return Err(StoreError::Corruption(format!(
                "{} node(s) left open",
                self.active - 1
            )));
        }
        let top = std::mem::take(&mut self.frames[0].entries);
        Ok(top.into_iter().next().map(|(_, value)| value))
    }

    fn top(&mut self) -> &mut Frame {
        &mut self.frames[self.active - 1]
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeHandler for TreeBuilder {
    fn open(&mut self, key: Value) {
        if self.active == self.frames.len() {
            self.frames.push(Frame::default());
        }
        let frame = &mut self.frames[self.active];
        frame.key = Some(key);
        frame.entries.clear();
        self.active += 1;
    }

    fn value(&mut self, key: Value, value: Value) {
        self.top().entries.push((key, value));
    }

    fn close(&mut self) -> Result<()> {
        if self.active <= 1 {
            return Err(StoreError::Corruption(
                "close without matching open".into(),
            ));
        }
        let frame = &mut self.frames[self.active - 1];
        let key = frame
            .key
            .take()
            .ok_or_else(|| StoreError::Corruption("open frame without key".into()))?;
        let complex: Complex = frame.entries.drain(..).collect();
        self.active -= 1;
        self.top().entries.push((key, Value::Complex(complex)));
        Ok(())
    }
}
