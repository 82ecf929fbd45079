//! Text form of values.
//!
//! Every value has a canonical text form produced by [`generate`]; [`parse`]
//! accepts it back. Row tables store keys and scalar values in this form and
//! the file store persists whole trees with it.
//!
//! Grammar, informally:
//!
//! ```text
//! value     := number | text | binary | reference | complex
//! number    := -?digits(.digits)?([eE][+-]?digits)?
//! text      := identifier | '"' escaped '"'
//! binary    := 0x hex-digits
//! reference := '<' '/' '>' | '<' ('/' part)+ '>'
//! complex   := '{' (entry (',' entry)*)? '}'
//! entry     := (key ':')? value
//! key       := value | '@' complex
//! ```
//!
//! Entry keys equal to the next automatic index are omitted on output. The
//! automatic index starts at 1 and continues after the last integral key.

use crate::builder::{TreeBuilder, TreeHandler};
use crate::error::{Result, StoreError};
use crate::reference::Reference;
use crate::types::{Complex, Number, Value};

/// Whitespace layout of generated text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// No optional whitespace.
    #[default]
    Compact,
    /// Single spaces after separators.
    Pretty,
    /// One entry per line, four-space indentation.
    Indent,
}

const INDENT: &str = "    ";

/// Canonical compact text of `value`.
pub fn generate(value: &Value) -> String {
    generate_with(value, Format::Compact)
}

pub fn generate_with(value: &Value, format: Format) -> String {
    let mut generator = Generator {
        out: String::new(),
        format,
        level: 0,
    };
    generator.write(value);
    generator.out
}

/// Whether `text` can be written without quotes.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Generator {
    out: String,
    format: Format,
    level: usize,
}

impl Generator {
    fn write(&mut self, value: &Value) {
        match value {
            Value::Number(n) => self.out.push_str(&n.to_string()),
            Value::Text(text) => self.write_text(text),
            Value::Binary(bytes) => {
                self.out.push_str("0x");
                self.out.push_str(&hex::encode_upper(bytes));
            }
            Value::Reference(reference) => self.write_reference(reference),
            Value::Complex(complex) => self.write_complex(complex),
        }
    }

    fn write_text(&mut self, text: &str) {
        if is_identifier(text) {
            self.out.push_str(text);
            return;
        }
        self.out.push('"');
        for c in text.chars() {
            match c {
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\n' => self.out.push_str("\\n"),
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn write_reference(&mut self, reference: &Reference) {
        self.out.push('<');
        if reference.is_root() {
            self.out.push('/');
        }
        for part in reference.parts() {
            self.out.push('/');
            self.write_inline(part);
        }
        self.out.push('>');
    }

    /// Write `value` on the current line regardless of format.
    fn write_inline(&mut self, value: &Value) {
        let format = std::mem::replace(&mut self.format, Format::Compact);
        self.write(value);
        self.format = format;
    }

    fn write_complex(&mut self, complex: &Complex) {
        self.out.push('{');
        if complex.is_empty() {
            self.out.push('}');
            return;
        }
        self.level += 1;
        let mut next_auto = 1i64;
        for (i, (key, value)) in complex.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.separate();

            let integral = key.as_number().and_then(Number::as_i64);
            if integral != Some(next_auto) {
                if key.is_complex() {
                    self.out.push('@');
                }
                self.write_inline(key);
                self.out.push(':');
                if self.format != Format::Compact {
                    self.out.push(' ');
                }
            }
            if let Some(index) = integral {
                next_auto = index.saturating_add(1);
            }
            self.write(value);
        }
        self.level -= 1;
        self.separate();
        self.out.push('}');
    }

    fn separate(&mut self) {
        match self.format {
            Format::Compact => {}
            Format::Pretty => self.out.push(' '),
            Format::Indent => {
                self.out.push('\n');
                for _ in 0..self.level {
                    self.out.push_str(INDENT);
                }
            }
        }
    }
}

/// Parse text produced by [`generate`] (in any [`Format`]).
pub fn parse(input: &str) -> Result<Value> {
    let mut builder = TreeBuilder::new();
    let mut parser = Parser::new(input);
    parser.parse_value(&mut builder, Value::number(1))?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek_char() {
        return Err(unexpected(Some(c)));
    }
    builder
        .finish()?
        .ok_or_else(|| StoreError::Parse("Unexpected end of input.".into()))
}

fn unexpected(c: Option<char>) -> StoreError {
    match c {
        Some(c) => StoreError::Parse(format!("Unexpected character '{}'.", c)),
        None => StoreError::Parse("Unexpected end of input.".into()),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(unexpected(self.peek_char()))
        }
    }

    /// Parse one value stored under `key`, streaming complex values into
    /// `handler`. Nesting is tracked on an explicit stack.
    fn parse_value<H: TreeHandler>(&mut self, handler: &mut H, key: Value) -> Result<()> {
        // next automatic key of every open block
        let mut blocks: Vec<i64> = Vec::new();
        let mut key = key;
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'{') {
                self.pos += 1;
                handler.open(key);
                blocks.push(1);
                self.skip_whitespace();
                if self.peek() != Some(b'}') {
                    key = self.parse_entry_key(&mut blocks)?;
                    continue;
                }
            } else {
                let value = self.parse_scalar()?;
                handler.value(key, value);
            }

            loop {
                if blocks.is_empty() {
                    return Ok(());
                }
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        key = self.parse_entry_key(&mut blocks)?;
                        break;
                    }
                    Some(b'}') => {
                        self.pos += 1;
                        handler.close()?;
                        blocks.pop();
                    }
                    _ => return Err(unexpected(self.peek_char())),
                }
            }
        }
    }

    /// Key of the next entry in the innermost block, leaving the position at
    /// the start of the entry's value.
    fn parse_entry_key(&mut self, blocks: &mut [i64]) -> Result<Value> {
        let next_auto = match blocks.last_mut() {
            Some(next) => next,
            None => return Err(StoreError::Parse("Entry outside of a block.".into())),
        };
        self.skip_whitespace();
        match self.peek() {
            Some(b'@') => {
                self.pos += 1;
                self.skip_whitespace();
                if self.peek() != Some(b'{') {
                    return Err(unexpected(self.peek_char()));
                }
                let key = self.parse_nested()?;
                self.expect(b':')?;
                Ok(key)
            }
            Some(b'{') => Ok(Self::auto_key(next_auto)),
            _ => {
                let start = self.pos;
                let candidate = self.parse_scalar()?;
                self.skip_whitespace();
                if self.peek() == Some(b':') {
                    self.pos += 1;
                    if let Some(index) = candidate.as_number().and_then(Number::as_i64) {
                        *next_auto = index.saturating_add(1);
                    }
                    Ok(candidate)
                } else {
                    // not a key: the entry is a bare value
                    self.pos = start;
                    Ok(Self::auto_key(next_auto))
                }
            }
        }
    }

    fn auto_key(next_auto: &mut i64) -> Value {
        let key = Value::number(*next_auto);
        *next_auto = next_auto.saturating_add(1);
        key
    }

    /// A complete complex value in key or reference-part position.
    fn parse_nested(&mut self) -> Result<Value> {
        let mut builder = TreeBuilder::new();
        self.parse_value(&mut builder, Value::number(1))?;
        builder
            .finish()?
            .ok_or_else(|| StoreError::Parse("Unexpected end of input.".into()))
    }

    fn parse_scalar(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'"') => self.parse_quoted(),
            Some(b'<') => self.parse_reference(),
            Some(b'0') if self.rest().as_bytes().get(1) == Some(&b'x') => self.parse_binary(),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
                    self.pos += 1;
                }
                Ok(Value::text(&self.input[start..self.pos]))
            }
            _ => Err(unexpected(self.peek_char())),
        }
    }

    fn parse_quoted(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut text = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(Value::Text(text));
                }
                '\\' => match chars.next() {
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, '"')) => text.push('"'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, other)) => {
                        return Err(StoreError::Parse(format!(
                            "Invalid escape sequence '\\{}'.",
                            other
                        )))
                    }
                    None => break,
                },
                c => text.push(c),
            }
        }
        Err(StoreError::Parse("Unterminated text.".into()))
    }

    fn parse_binary(&mut self) -> Result<Value> {
        self.pos += 2;
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        if digits.len() % 2 != 0 {
            return Err(StoreError::Parse(
                "Invalid binary value: even number of digits expected.".into(),
            ));
        }
        hex::decode(digits)
            .map(Value::Binary)
            .map_err(|e| StoreError::Parse(format!("Invalid binary value: {}.", e)))
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        self.digits()?;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            self.digits()?;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.digits()?;
        }
        let literal = &self.input[start..self.pos];
        literal
            .parse::<f64>()
            .ok()
            .and_then(Number::new)
            .map(Value::Number)
            .ok_or_else(|| StoreError::Parse(format!("Invalid number '{}'.", literal)))
    }

    fn digits(&mut self) -> Result<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(unexpected(self.peek_char()));
        }
        Ok(())
    }

    fn parse_reference(&mut self) -> Result<Value> {
        self.pos += 1;
        self.expect(b'/')?;
        let mut reference = Reference::root();
        self.skip_whitespace();
        if self.peek() == Some(b'>') {
            self.pos += 1;
            return Ok(Value::Reference(reference));
        }
        loop {
            self.skip_whitespace();
            let part = if self.peek() == Some(b'{') {
                self.parse_nested()?
            } else {
                self.parse_scalar()?
            };
            reference = reference.child(part);
            self.skip_whitespace();
            match self.peek() {
                Some(b'/') => self.pos += 1,
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(Value::Reference(reference));
                }
                _ => return Err(unexpected(self.peek_char())),
            }
        }
    }
}
