//! Value matcher for the fast inference strategy.
//!
//! Without a second render, provenance is guessed by looking for the values
//! the templates reference inside the baseline manifests:
//!
//! 1. The values tree is flattened into `path → value` for every node
//!    (intermediate and leaf) whose path the templates reference.
//! 2. Scalars are indexed by their string form (`"nginx"`, `"1.25"`, `"true"`).
//! 3. Every manifest field is compared structurally against the candidates
//!    (numbers numerically). A match is an exact mapping. Non-empty objects and
//!    arrays are compared before their children are visited.
//! 4. Otherwise a string field is searched for indexed strings, longest first.
//!    Each hit is cut out of the not-yet-replaced parts of the string, and one
//!    substring mapping is produced per values path whose string survived.
//!    Each mapping's tagged string carries that path's own marker at its hits.
//!
//! Ties between several candidate paths are settled by [`TieBreak`]. The
//! winner's marker stands for a shared string in the tagged strings of paths
//! that do not share it.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::FieldMapping;
use super::sentinel::marker;
use crate::config::TieBreak;
use crate::constants::{MAX_WALK_DEPTH, MIN_SUBSTRING_MATCH_LEN};
use crate::core::Resource;
use crate::ids::ResourceIds;
use crate::utils::FieldPath;

/// Top-level manifest keys that are never attributed to values.
const IGNORED_ROOT_KEYS: &[&str] = &["apiVersion", "kind"];

/// Flatten `values` into `path → value` for every referenced node.
#[must_use]
pub fn flatten_values(values: &Value, referenced: &BTreeSet<String>) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    let mut path = FieldPath::root();
    flatten_into(values, &mut path, referenced, &mut flat);
    flat
}

fn flatten_into(
    value: &Value,
    path: &mut FieldPath,
    referenced: &BTreeSet<String>,
    flat: &mut BTreeMap<String, Value>,
) {
    if !path.is_empty() {
        let key = path.to_string();
        if referenced.contains(&key) {
            flat.insert(key, value.clone());
        }
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push_key(key.clone());
                flatten_into(child, path, referenced, flat);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push_index(index);
                flatten_into(child, path, referenced, flat);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Structural equality with numbers compared by value (`3` equals `3.0`).
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64().zip(y.as_f64()).is_some_and(|(x, y)| (x - y).abs() == 0.0)
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, xv)| y.get(k).is_some_and(|yv| values_equal(xv, yv)))
        }
        _ => a == b,
    }
}

fn is_matchable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn string_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn path_depth(path: &str) -> usize {
    FieldPath::parse(path).map_or(0, |p| p.len())
}

/// Candidate values prepared for one matching run.
#[derive(Debug, Default)]
struct MatchIndex {
    /// `path → value`, matchable values only
    candidates: BTreeMap<String, Value>,
    /// string form → sorted paths, for strings of at least the minimum length
    by_string: BTreeMap<String, Vec<String>>,
}

impl MatchIndex {
    fn build(values: &Value, referenced: &BTreeSet<String>) -> Self {
        let mut index = Self::default();
        for (path, value) in flatten_values(values, referenced) {
            if !is_matchable(&value) {
                continue;
            }
            if let Some(s) = string_form(&value)
                && s.len() >= MIN_SUBSTRING_MATCH_LEN
            {
                index.by_string.entry(s).or_default().push(path.clone());
            }
            index.candidates.insert(path, value);
        }
        index
    }
}

enum Piece {
    Literal(String),
    /// Index of the hit whose string was cut out here
    Hit(usize),
}

/// Attributes manifest fields to values paths by value equality and containment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueMatcher {
    tie_break: TieBreak,
}

impl ValueMatcher {
    /// Create a matcher with the given tie-break.
    #[must_use]
    pub const fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Match every field of every resource against the referenced values.
    ///
    /// Resources without an ID are skipped. Mappings come out per resource in
    /// input order, fields in walk order.
    #[must_use]
    pub fn match_resources(
        &self,
        resources: &[Resource],
        ids: &ResourceIds,
        values: &Value,
        referenced: &BTreeSet<String>,
    ) -> Vec<FieldMapping> {
        let index = MatchIndex::build(values, referenced);
        if index.candidates.is_empty() {
            return Vec::new();
        }
        tracing::debug!(
            "Matching {} resources against {} referenced values",
            resources.len(),
            index.candidates.len()
        );

        let mut mappings = Vec::new();
        for resource in resources {
            let Some(id) = ids.get(resource) else {
                continue;
            };
            let Value::Object(root) = &resource.object else {
                continue;
            };
            let mut path = FieldPath::root();
            for (key, child) in root {
                if IGNORED_ROOT_KEYS.contains(&key.as_str()) {
                    continue;
                }
                path.push_key(key.clone());
                self.walk(child, &mut path, 1, &index, id, &mut mappings);
                path.pop();
            }
        }
        mappings
    }

    fn walk(
        &self,
        node: &Value,
        path: &mut FieldPath,
        depth: usize,
        index: &MatchIndex,
        id: &str,
        out: &mut Vec<FieldMapping>,
    ) {
        if depth > MAX_WALK_DEPTH || !is_matchable(node) {
            return;
        }
        if let Some(values_path) = self.exact_match(node, index) {
            out.push(FieldMapping::exact(values_path, id, path.to_string()));
            return;
        }

        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    path.push_key(key.clone());
                    self.walk(child, path, depth + 1, index, id, out);
                    path.pop();
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    path.push_index(i);
                    self.walk(child, path, depth + 1, index, id, out);
                    path.pop();
                }
            }
            Value::String(field) => {
                for (values_path, tagged) in self.substring_match(field, index) {
                    out.push(FieldMapping::substring(values_path, id, path.to_string(), tagged));
                }
            }
            _ => {}
        }
    }

    fn choose<'a>(&self, paths: &[&'a str]) -> Option<&'a str> {
        match self.tie_break {
            TieBreak::Lexicographic => paths.iter().min().copied(),
            TieBreak::MostSpecific => paths
                .iter()
                .copied()
                .min_by(|a, b| path_depth(b).cmp(&path_depth(a)).then_with(|| a.cmp(b))),
        }
    }

    fn exact_match(&self, node: &Value, index: &MatchIndex) -> Option<String> {
        let matches: Vec<&str> = index
            .candidates
            .iter()
            .filter(|(_, candidate)| values_equal(candidate, node))
            .map(|(path, _)| path.as_str())
            .collect();
        self.choose(&matches).map(str::to_string)
    }

    /// Rebuild `field` with markers for contained values.
    ///
    /// Returns `values path → tagged string` for every path whose value was
    /// cut out at least once; empty when nothing matched.
    fn substring_match(&self, field: &str, index: &MatchIndex) -> BTreeMap<String, String> {
        let mut hits: Vec<(&String, &Vec<String>)> =
            index.by_string.iter().filter(|(s, _)| field.contains(s.as_str())).collect();
        hits.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut pieces = vec![Piece::Literal(field.to_string())];
        let mut chosen: Vec<&str> = Vec::with_capacity(hits.len());
        let mut surviving: BTreeMap<&str, usize> = BTreeMap::new();

        for (hit, (needle, paths)) in hits.iter().enumerate() {
            let candidates: Vec<&str> = paths.iter().map(String::as_str).collect();
            chosen.push(self.choose(&candidates).unwrap_or_default());
            let mut replaced = false;
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                match piece {
                    Piece::Literal(text) if text.contains(needle.as_str()) => {
                        replaced = true;
                        let mut parts = text.split(needle.as_str()).peekable();
                        while let Some(part) = parts.next() {
                            if !part.is_empty() {
                                next.push(Piece::Literal(part.to_string()));
                            }
                            if parts.peek().is_some() {
                                next.push(Piece::Hit(hit));
                            }
                        }
                    }
                    other => next.push(other),
                }
            }
            pieces = next;
            if replaced {
                surviving.extend(candidates.into_iter().map(|path| (path, hit)));
            }
        }

        surviving
            .into_iter()
            .map(|(own_path, own_hit)| {
                let tagged: String = pieces
                    .iter()
                    .map(|piece| match piece {
                        Piece::Literal(text) => text.clone(),
                        Piece::Hit(hit) if *hit == own_hit => marker(own_path),
                        Piece::Hit(hit) => marker(chosen[*hit]),
                    })
                    .collect();
                (own_path.to_string(), tagged)
            })
            .collect()
    }
}
