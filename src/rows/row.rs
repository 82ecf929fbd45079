//! Table rows and their line format.

use crate::error::{Result, StoreError};
use crate::rows::path::Path;
use std::fmt;
use std::num::NonZeroU32;

/// What a row holds: a complex node or a scalar value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowContent {
    /// A complex node whose children live under `parent + [suffix]`.
    Complex(NonZeroU32),
    /// The text form of a scalar value.
    Scalar(String),
}

/// One entry of a row table.
///
/// A row is identified by `(parent, key)`. Keys hold the text form of the
/// entry's key value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Row {
    parent: Path,
    key: String,
    content: RowContent,
}

impl Row {
    pub fn complex(parent: Path, key: impl Into<String>, suffix: u32) -> Result<Row> {
        let suffix = NonZeroU32::new(suffix)
            .ok_or_else(|| StoreError::InvalidRow("suffix > 0 expected".into()))?;
        Ok(Row {
            parent,
            key: key.into(),
            content: RowContent::Complex(suffix),
        })
    }

    pub fn scalar(parent: Path, key: impl Into<String>, value: impl Into<String>) -> Row {
        Row {
            parent,
            key: key.into(),
            content: RowContent::Scalar(value.into()),
        }
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &RowContent {
        &self.content
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.content, RowContent::Complex(_))
    }

    pub fn suffix(&self) -> Option<u32> {
        match self.content {
            RowContent::Complex(suffix) => Some(suffix.get()),
            RowContent::Scalar(_) => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.content {
            RowContent::Complex(_) => None,
            RowContent::Scalar(value) => Some(value),
        }
    }

    /// Path under which the children of a complex row are stored.
    pub fn fullpath(&self) -> Option<Path> {
        self.suffix().map(|suffix| self.parent.add(suffix))
    }

    /// The deepest path this row occupies: its fullpath when complex, its
    /// parent otherwise.
    pub fn effective_path(&self) -> Path {
        self.fullpath().unwrap_or_else(|| self.parent.clone())
    }

    /// Sort key for depth-first iteration. Scalars count as suffix 0, so
    /// they come before the complex siblings of the same parent.
    pub(crate) fn iteration_key(&self) -> (Path, String) {
        (self.parent.add(self.suffix().unwrap_or(0)), self.key.clone())
    }

    /// `path \t key \t suffix \t value`, with empty fields for absent parts.
    pub fn encode(&self) -> String {
        match &self.content {
            RowContent::Complex(suffix) => {
                format!("{}\t{}\t{}\t", self.parent.encode(), self.key, suffix)
            }
            RowContent::Scalar(value) => {
                format!("{}\t{}\t\t{}", self.parent.encode(), self.key, value)
            }
        }
    }

    pub fn decode(line: &str) -> Result<Row> {
        let malformed = || StoreError::MalformedRow(line.to_string());

        let mut fields = line.splitn(4, '\t');
        let (path, key, suffix, value) =
            match (fields.next(), fields.next(), fields.next(), fields.next()) {
                (Some(p), Some(k), Some(s), Some(v)) => (p, k, s, v),
                _ => return Err(malformed()),
            };

        let parent = Path::decode(path)?;
        if suffix.is_empty() {
            return Ok(Row::scalar(parent, key, value));
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let suffix: u32 = suffix.parse().map_err(|_| malformed())?;
        if !value.is_empty() {
            return Err(StoreError::InvalidRow(format!(
                "complex row carries a value: {}",
                line
            )));
        }
        Row::complex(parent, key, suffix)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            RowContent::Complex(suffix) => write!(
                f,
                "parent={}, key={}, suffix={}, value=",
                self.parent, self.key, suffix
            ),
            RowContent::Scalar(value) => write!(
                f,
                "parent={}, key={}, suffix=, value={}",
                self.parent, self.key, value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_row() {
        let row = Row::complex(Path::of(&[1]), "key2", 1).unwrap();
        assert!(row.is_complex());
        assert_eq!(row.suffix(), Some(1));
        assert_eq!(row.value(), None);
        assert_eq!(row.fullpath(), Some(Path::of(&[1, 1])));
        assert_eq!(row.effective_path(), Path::of(&[1, 1]));
        assert_eq!(row.encode(), "1\tkey2\t1\t");
    }

    #[test]
    fn test_scalar_row() {
        let row = Row::scalar(Path::of(&[1, 1]), "1", "val2A");
        assert!(!row.is_complex());
        assert_eq!(row.fullpath(), None);
        assert_eq!(row.effective_path(), Path::of(&[1, 1]));
        assert_eq!(row.encode(), "11\t1\t\tval2A");
        assert_eq!(
            row.to_string(),
            "parent=[1, 1], key=1, suffix=, value=val2A"
        );
    }

    #[test]
    fn test_zero_suffix_rejected() {
        assert!(matches!(
            Row::complex(Path::root(), "", 0),
            Err(StoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            Row::decode("\t\t1\t").unwrap(),
            Row::complex(Path::root(), "", 1).unwrap()
        );
        assert_eq!(
            Row::decode("1\tkey1\t\tval1").unwrap(),
            Row::scalar(Path::of(&[1]), "key1", "val1")
        );
        // value field may itself contain tabs
        assert_eq!(
            Row::decode("1\tk\t\ta\tb").unwrap().value(),
            Some("a\tb")
        );
    }

    #[test]
    fn test_decode_malformed() {
        let err = Row::decode("1\tkey1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Line does not match pattern for row: 1\tkey1"
        );
        assert!(matches!(
            Row::decode("1\tk\tx\t"),
            Err(StoreError::MalformedRow(_))
        ));
        assert!(matches!(
            Row::decode("1\tk\t+3\t"),
            Err(StoreError::MalformedRow(_))
        ));
        assert!(matches!(
            Row::decode("1\tk\t0\t"),
            Err(StoreError::InvalidRow(_))
        ));
        assert!(matches!(
            Row::decode("1\tk\t2\tv"),
            Err(StoreError::InvalidRow(_))
        ));
        assert!(matches!(
            Row::decode("!\tk\t\tv"),
            Err(StoreError::MalformedPath(_))
        ));
    }

    #[test]
    fn test_iteration_key_puts_scalars_first() {
        let scalar = Row::scalar(Path::of(&[1]), "zzz", "v");
        let complex = Row::complex(Path::of(&[1]), "aaa", 1).unwrap();
        assert!(scalar.iteration_key() < complex.iteration_key());
    }
}
