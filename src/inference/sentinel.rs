//! Sentinel markers.
//!
//! A sentinel is `__CG_SENTINEL__<values path>__CG_END__`. Rendering a package
//! with every values leaf replaced by its sentinel shows, verbatim or embedded
//! in larger strings, which output fields each value flowed into.

use serde_json::{Map, Value};

use crate::constants::{SENTINEL_PREFIX, SENTINEL_SUFFIX};
use crate::utils::FieldPath;

/// A piece of a sentinel-tagged string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Literal text between markers
    Literal(&'a str),
    /// The values path of a marker
    Marker(&'a str),
}

/// The sentinel marker for a values path.
#[must_use]
pub fn marker(path: &str) -> String {
    format!("{SENTINEL_PREFIX}{path}{SENTINEL_SUFFIX}")
}

/// Split a tagged string into literal text and markers, left to right.
///
/// A prefix without a matching suffix is kept as literal text.
#[must_use]
pub fn split(tagged: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = tagged;

    while let Some(start) = rest.find(SENTINEL_PREFIX) {
        let after_prefix = &rest[start + SENTINEL_PREFIX.len()..];
        let Some(end) = after_prefix.find(SENTINEL_SUFFIX) else {
            break;
        };
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }
        pieces.push(Piece::Marker(&after_prefix[..end]));
        rest = &after_prefix[end + SENTINEL_SUFFIX.len()..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    pieces
}

/// The values path if `s` is exactly one marker and nothing else.
#[must_use]
pub fn exact_marker(s: &str) -> Option<&str> {
    match split(s).as_slice() {
        [Piece::Marker(path)] => Some(path),
        _ => None,
    }
}

/// Distinct values paths of every marker embedded in `s`, in order of appearance.
#[must_use]
pub fn embedded_paths(s: &str) -> Vec<&str> {
    let mut paths: Vec<&str> = Vec::new();
    for piece in split(s) {
        if let Piece::Marker(path) = piece
            && !paths.contains(&path)
        {
            paths.push(path);
        }
    }
    paths
}

/// Whether `s` contains at least one complete marker.
#[must_use]
pub fn contains_marker(s: &str) -> bool {
    split(s).iter().any(|p| matches!(p, Piece::Marker(_)))
}

/// Replace every non-null leaf of a values tree by its sentinel marker.
///
/// Numbers and booleans become marker strings too; empty objects and arrays
/// are kept as they are. Nulls stay null so `if`/`default` guards behave the
/// same as in the baseline render.
#[must_use]
pub fn sentinelize(values: &Value) -> Value {
    let mut path = FieldPath::root();
    sentinelize_at(values, &mut path)
}

fn sentinelize_at(value: &Value, path: &mut FieldPath) -> Value {
    match value {
        Value::Object(map) => {
            let mut tagged = Map::new();
            for (key, child) in map {
                path.push_key(key.clone());
                tagged.insert(key.clone(), sentinelize_at(child, path));
                path.pop();
            }
            Value::Object(tagged)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    path.push_index(index);
                    let tagged = sentinelize_at(child, path);
                    path.pop();
                    tagged
                })
                .collect(),
        ),
        Value::Null => Value::Null,
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Value::String(marker(&path.to_string()))
        }
    }
}
