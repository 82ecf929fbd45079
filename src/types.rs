//! Core value types for the store.

use crate::codec;
use crate::reference::Reference;
use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Largest magnitude at which every integer is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A finite numeric value.
#[derive(Clone, Copy)]
pub struct Number(f64);

impl Number {
    /// Wrap a float. Returns `None` for NaN and infinities.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() {
            // -0.0 and 0.0 must compare and hash equal
            Some(Number(if value == 0.0 { 0.0 } else { value }))
        } else {
            None
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// The value as an integer, if it is integral and exactly representable.
    pub fn as_i64(self) -> Option<i64> {
        if self.0.fract() == 0.0 && self.0.abs() <= MAX_EXACT_INTEGER {
            Some(self.0 as i64)
        } else {
            None
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value as f64)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number(f64::from(value))
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number(f64::from(value))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({})", self)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_i64() {
            Some(i) => write!(f, "{}", i),
            None => write!(f, "{}", self.0),
        }
    }
}

/// The kind of a value. Kinds sort in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Number,
    Text,
    Binary,
    Reference,
    Complex,
}

/// An immutable value.
///
/// Values are totally ordered: first by [`Kind`], then within the kind.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Number(Number),
    Text(String),
    Binary(Vec<u8>),
    Reference(Reference),
    Complex(Complex),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn number(value: i64) -> Self {
        Value::Number(Number::from(value))
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Value::Binary(value.into())
    }

    /// The empty complex value.
    pub fn empty() -> Self {
        Value::Complex(Complex::new())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Number(_) => Kind::Number,
            Value::Text(_) => Kind::Text,
            Value::Binary(_) => Kind::Binary,
            Value::Reference(_) => Kind::Reference,
            Value::Complex(_) => Kind::Complex,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Value::Complex(_))
    }

    pub fn as_complex(&self) -> Option<&Complex> {
        match self {
            Value::Complex(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_complex(self) -> Option<Complex> {
        match self {
            Value::Complex(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", codec::generate(self))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::generate(self))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<Complex> for Value {
    fn from(value: Complex) -> Self {
        Value::Complex(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Value::Reference(value)
    }
}

/// An immutable, ordered map of key/value pairs.
///
/// Clones share the backing map; `put` and `remove` consume `self` and only
/// copy the map when it is shared.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Complex {
    entries: Arc<BTreeMap<Value, Value>>,
}

impl Complex {
    pub fn new() -> Self {
        Self::default()
    }

    /// A complex value keyed `1..=n` in iteration order of `values`.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        values.into_iter().fold(Complex::new(), Complex::add)
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns a copy with `key` mapped to `value`.
    pub fn put(mut self, key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.entries).insert(key.into(), value.into());
        self
    }

    /// `put` for `Some`, `remove` for `None`.
    pub fn put_opt(self, key: Value, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.put(key, value),
            None => self.remove(&key),
        }
    }

    pub fn remove(mut self, key: &Value) -> Self {
        if self.entries.contains_key(key) {
            Arc::make_mut(&mut self.entries).remove(key);
        }
        self
    }

    /// Appends `value` under [`Complex::next_index`].
    pub fn add(self, value: Value) -> Self {
        let index = self.next_index();
        self.put(Value::number(index), value)
    }

    /// One past the largest integral numeric key, or 1.
    pub fn next_index(&self) -> i64 {
        self.entries
            .keys()
            .filter_map(|k| k.as_number().and_then(Number::as_i64))
            .max()
            .map_or(1, |max| max.saturating_add(1).max(1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Value, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, Value, Value> {
        self.entries.keys()
    }
}

impl<'a> IntoIterator for &'a Complex {
    type Item = (&'a Value, &'a Value);
    type IntoIter = btree_map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<(Value, Value)> for Complex {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Complex {
            entries: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl fmt::Debug for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
