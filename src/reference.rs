//! References: immutable, structurally shared sequences of parts.

use crate::error::{Result, StoreError};
use crate::types::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One appended part. The prefix is shared with the parent reference.
struct Link {
    parent: Option<Arc<Link>>,
    part: Value,
    count: usize,
}

/// An immutable reference into the value tree.
///
/// The root reference has no parts. [`Reference::child`] appends a part
/// without copying the prefix.
#[derive(Clone, Default)]
pub struct Reference {
    last: Option<Arc<Link>>,
}

impl Reference {
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a reference from the root by appending every part in order.
    pub fn from_parts<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::root().descendant(parts)
    }

    pub fn child(&self, part: impl Into<Value>) -> Self {
        Reference {
            last: Some(Arc::new(Link {
                parent: self.last.clone(),
                part: part.into(),
                count: self.part_count() + 1,
            })),
        }
    }

    pub fn descendant<I>(&self, parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        parts
            .into_iter()
            .fold(self.clone(), |reference, part| reference.child(part))
    }

    /// The parent reference, `None` for the root.
    pub fn parent(&self) -> Option<Reference> {
        self.last.as_ref().map(|link| Reference {
            last: link.parent.clone(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.last.is_none()
    }

    pub fn part_count(&self) -> usize {
        self.last.as_ref().map_or(0, |link| link.count)
    }

    /// The part at `index`, counted from the root.
    pub fn part_at(&self, index: usize) -> Result<&Value> {
        let count = self.part_count();
        if index >= count {
            return Err(StoreError::IndexOutOfBounds { index, count });
        }
        let mut link = self.last.as_deref();
        while let Some(current) = link {
            if current.count == index + 1 {
                return Ok(&current.part);
            }
            link = current.parent.as_deref();
        }
        Err(StoreError::IndexOutOfBounds { index, count })
    }

    pub fn last_part(&self) -> Option<&Value> {
        self.last.as_deref().map(|link| &link.part)
    }

    /// All parts, root first.
    pub fn parts(&self) -> Vec<&Value> {
        let mut parts = Vec::with_capacity(self.part_count());
        let mut link = self.last.as_deref();
        while let Some(current) = link {
            parts.push(&current.part);
            link = current.parent.as_deref();
        }
        parts.reverse();
        parts
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.part_count() == other.part_count() && self.parts() == other.parts()
    }
}

impl Eq for Reference {}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        // Vec ordering: part-wise, then shorter first
        self.parts().cmp(&other.parts())
    }
}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts().hash(state);
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.parts()).finish()
    }
}
