//! Dotted/indexed field paths over generic manifest values.
//!
//! A field path addresses a location inside a [`serde_json::Value`]:
//!
//! - `spec.replicas` - object keys separated by dots
//! - `spec.containers[0].image` - array indices in brackets
//! - `metadata.annotations["app.kubernetes.io/name"]` - keys containing `.`,
//!   `[`, `]` or `"` are written in quoted bracket form
//!
//! The same syntax is used for values-tree paths (`image.tag`, `hosts[1]`), so
//! a path produced by one walker can be parsed back by another.

use anyhow::Result;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::core::ChartGraphError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object key
    Key(String),
    /// Array index
    Index(usize),
}

/// A parsed field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The empty path, addressing the root value.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a path string.
    ///
    /// # Errors
    ///
    /// Returns [`ChartGraphError::InvalidFieldPath`] for empty keys, dangling
    /// dots, unterminated brackets or quotes, and non-numeric indices.
    pub fn parse(path: &str) -> Result<Self> {
        Parser {
            input: path,
            chars: path.char_indices().peekable(),
        }
        .parse()
        .map_err(|reason| {
            ChartGraphError::InvalidFieldPath {
                path: path.to_string(),
                reason,
            }
            .into()
        })
    }

    /// The segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Append an object key.
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(Segment::Key(key.into()));
    }

    /// Append an array index.
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(Segment::Index(index));
    }

    /// Remove the last segment.
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }
}

impl FromStr for FieldPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '"'])
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if needs_quoting(key) => {
                    let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "[\"{escaped}\"]")?;
                }
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<FieldPath, String> {
        let mut path = FieldPath::root();
        if self.input.is_empty() {
            return Ok(path);
        }

        let mut expect_key = true;
        loop {
            match self.chars.peek().copied() {
                None => {
                    if expect_key && !path.is_empty() {
                        return Err("path ends with '.'".to_string());
                    }
                    return Ok(path);
                }
                Some((_, '[')) => {
                    if expect_key && !path.is_empty() {
                        return Err("'.' must be followed by a key".to_string());
                    }
                    self.chars.next();
                    path.segments.push(self.bracket()?);
                    expect_key = false;
                }
                Some((_, '.')) => {
                    if expect_key {
                        return Err("empty key".to_string());
                    }
                    self.chars.next();
                    expect_key = true;
                }
                Some((start, _)) => {
                    if !expect_key {
                        return Err(format!("unexpected character at offset {start}"));
                    }
                    let mut end = self.input.len();
                    while let Some(&(i, c)) = self.chars.peek() {
                        if c == '.' || c == '[' {
                            end = i;
                            break;
                        }
                        if c == ']' || c == '"' {
                            return Err(format!("unexpected '{c}' at offset {i}"));
                        }
                        self.chars.next();
                    }
                    path.push_key(&self.input[start..end]);
                    expect_key = false;
                }
            }
        }
    }

    fn bracket(&mut self) -> Result<Segment, String> {
        if matches!(self.chars.peek(), Some((_, '"'))) {
            self.chars.next();
            let mut key = String::new();
            loop {
                match self.chars.next() {
                    Some((_, '\\')) => match self.chars.next() {
                        Some((_, c)) => key.push(c),
                        None => return Err("unterminated escape".to_string()),
                    },
                    Some((_, '"')) => break,
                    Some((_, c)) => key.push(c),
                    None => return Err("unterminated quoted key".to_string()),
                }
            }
            return match self.chars.next() {
                Some((_, ']')) => Ok(Segment::Key(key)),
                _ => Err("expected ']' after quoted key".to_string()),
            };
        }

        let mut digits = String::new();
        loop {
            match self.chars.next() {
                Some((_, ']')) => break,
                Some((_, c)) if c.is_ascii_digit() => digits.push(c),
                Some((i, c)) => return Err(format!("invalid index character '{c}' at offset {i}")),
                None => return Err("unterminated '['".to_string()),
            }
        }
        digits
            .parse::<usize>()
            .map(Segment::Index)
            .map_err(|_| "empty or oversized index".to_string())
    }
}

/// Read the value at `path`.
#[must_use]
pub fn get<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments.iter().try_fold(value, |current, segment| match (segment, current) {
        (Segment::Key(key), Value::Object(map)) => map.get(key),
        (Segment::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

/// Mutable access to the value at `path`.
pub fn get_mut<'a>(value: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    path.segments.iter().try_fold(value, |current, segment| match (segment, current) {
        (Segment::Key(key), Value::Object(map)) => map.get_mut(key),
        (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
        _ => None,
    })
}

/// Convenience: read `path` given as a string. Invalid paths read as absent.
#[must_use]
pub fn get_str_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    FieldPath::parse(path).ok().and_then(|p| get(value, &p))
}

/// Write `new_value` at `path`, replacing whatever is there.
///
/// Missing (or null) intermediate values under key segments are created as
/// objects. Index segments must address an existing array element.
///
/// # Errors
///
/// Returns [`ChartGraphError::InvalidFieldPath`] when a key segment meets a
/// non-object, or an index segment meets a non-array or is out of range.
pub fn set(value: &mut Value, path: &FieldPath, new_value: Value) -> Result<()> {
    let invalid = |reason: String| -> anyhow::Error {
        ChartGraphError::InvalidFieldPath {
            path: path.to_string(),
            reason,
        }
        .into()
    };

    let Some((last, parents)) = path.segments.split_last() else {
        *value = new_value;
        return Ok(());
    };

    let mut current = value;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let Value::Object(map) = current else {
                    return Err(invalid(format!("'{key}' is not inside an object")));
                };
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                slot
            }
            Segment::Index(index) => {
                let Value::Array(items) = current else {
                    return Err(invalid(format!("[{index}] is not inside an array")));
                };
                let len = items.len();
                items
                    .get_mut(*index)
                    .ok_or_else(|| invalid(format!("index {index} out of range (len {len})")))?
            }
        };
    }

    match last {
        Segment::Key(key) => {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                return Err(invalid(format!("'{key}' is not inside an object")));
            };
            map.insert(key.clone(), new_value);
        }
        Segment::Index(index) => {
            let Value::Array(items) = current else {
                return Err(invalid(format!("[{index}] is not inside an array")));
            };
            let len = items.len();
            let slot = items
                .get_mut(*index)
                .ok_or_else(|| invalid(format!("index {index} out of range (len {len})")))?;
            *slot = new_value;
        }
    }
    Ok(())
}
