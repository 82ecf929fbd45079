//! The store contract shared by every backend.

use crate::error::Result;
use crate::reference::Reference;
use crate::rows::Database;
use crate::types::{Complex, Value};
use std::sync::Arc;

/// A key and its shallow value, as returned by [`Store::browse`].
pub type Entry = (Value, Value);

/// Reference-addressed access to a value tree.
///
/// Implementations are safe to share between threads. Operations are
/// synchronous and run to completion or fail; nothing is retried.
pub trait Store: Send + Sync {
    /// The value at `reference`, or `None` if nothing is stored there.
    ///
    /// A reference that passes through a non-complex value does not exist.
    fn read(&self, reference: &Reference) -> Result<Option<Value>>;

    /// Replace the value at `reference`; `None` deletes it.
    ///
    /// Fails with `WriteNonExisting` or `WriteNonComplex` when the parent of
    /// `reference` is missing or not complex.
    fn write(&self, reference: &Reference, value: Option<Value>) -> Result<()>;

    /// The immediate children of the complex value at `reference`, in key
    /// order. Complex children are represented by an empty placeholder.
    fn browse(&self, reference: &Reference) -> Result<Vec<Entry>>;

    /// Release resources and persist pending state, if the backend has any.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// The row table behind this store, if it is row-table backed.
    fn database(&self) -> Option<Arc<dyn Database>> {
        None
    }
}

/// The browse form of a child: scalars as-is, complex values emptied.
pub(crate) fn shallow(value: &Value) -> Value {
    if value.is_complex() {
        Value::Complex(Complex::new())
    } else {
        value.clone()
    }
}
