//! Integer paths and their compact string encoding.
//!
//! Each part is written with a 64-symbol alphabet. Parts up to 36 take one
//! symbol. Larger parts take a prefix symbol announcing the digit count,
//! followed by base-64 digits, most significant first:
//!
//! ```text
//! 5          -> "5"
//! 36         -> "_"
//! 37         -> "aa"      (prefix 'a' = one digit)
//! 64         -> "b10"     (prefix 'b' = two digits)
//! 0xFFFFFFFF -> "f3~~~~~"
//! ```
//!
//! Decoding accepts only the canonical form, so every string maps to at most
//! one path.

use crate::error::{Result, StoreError};
use std::fmt;

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz~";

/// Largest part written as a single symbol.
const SHORT_LIMIT: u32 = 36;

/// Base-64 digits needed for `u32::MAX`.
const MAX_DIGITS: usize = 6;

fn symbol_value(symbol: u8) -> Option<u32> {
    let value = match symbol {
        b'0'..=b'9' => symbol - b'0',
        b'A'..=b'Z' => symbol - b'A' + 10,
        b'_' => 36,
        b'a'..=b'z' => symbol - b'a' + 37,
        b'~' => 63,
        _ => return None,
    };
    Some(u32::from(value))
}

/// A sequence of non-negative integers identifying a node in a row table.
///
/// Paths order part-wise, with a proper prefix before its extensions.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<u32>);

impl Path {
    /// The empty path.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn of(parts: &[u32]) -> Self {
        Path(parts.to_vec())
    }

    /// A new path with `part` appended.
    pub fn add(&self, part: u32) -> Path {
        let mut parts = Vec::with_capacity(self.0.len() + 1);
        parts.extend_from_slice(&self.0);
        parts.push(part);
        Path(parts)
    }

    /// The path without its last part, `None` for the empty path.
    pub fn parent(&self) -> Option<Path> {
        self.0.split_last().map(|(_, rest)| Path(rest.to_vec()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Length of the longest common prefix.
    pub fn prefix_len(&self, other: &Path) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for &part in &self.0 {
            encode_part(part, &mut out);
        }
        out
    }

    pub fn decode(encoded: &str) -> Result<Path> {
        let malformed = |reason: &str| StoreError::MalformedPath(format!("{:?}: {}", encoded, reason));

        let bytes = encoded.as_bytes();
        let mut parts = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let symbol = symbol_value(bytes[i]).ok_or_else(|| malformed("invalid symbol"))?;
            i += 1;
            if symbol <= SHORT_LIMIT {
                parts.push(symbol);
                continue;
            }

            let digits = (symbol - SHORT_LIMIT) as usize;
            if digits > MAX_DIGITS {
                return Err(malformed("invalid length prefix"));
            }
            let end = i + digits;
            if end > bytes.len() {
                return Err(malformed("truncated part"));
            }
            let mut value: u64 = 0;
            for (n, &b) in bytes[i..end].iter().enumerate() {
                let digit = symbol_value(b).ok_or_else(|| malformed("invalid symbol"))?;
                if n == 0 && digit == 0 {
                    return Err(malformed("leading zero digit"));
                }
                value = value * 64 + u64::from(digit);
            }
            let part = u32::try_from(value).map_err(|_| malformed("part out of range"))?;
            if part <= SHORT_LIMIT {
                return Err(malformed("non-canonical part"));
            }
            parts.push(part);
            i = end;
        }
        Ok(Path(parts))
    }
}

fn encode_part(part: u32, out: &mut String) {
    if part <= SHORT_LIMIT {
        out.push(ALPHABET[part as usize] as char);
        return;
    }
    let mut digits = [0u8; MAX_DIGITS];
    let mut count = 0;
    let mut rest = part;
    while rest > 0 {
        digits[count] = ALPHABET[(rest % 64) as usize];
        rest /= 64;
        count += 1;
    }
    out.push(ALPHABET[SHORT_LIMIT as usize + count] as char);
    for &digit in digits[..count].iter().rev() {
        out.push(digit as char);
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", part)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path{}", self)
    }
}
