//! Schema extraction.
//!
//! The orchestrator exposes mapped values as schema fields of the generated
//! resource graph. Extracting that schema (from a JSON schema shipped with the
//! package, from comments, ...) is a collaborator concern behind
//! [`SchemaExtractor`]; [`InferredSchemaExtractor`] is the default and infers
//! types from the values themselves.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::inference::FieldMapping;
use crate::inference::sentinel::{Piece, marker, split};
use crate::utils::FieldPath;
use crate::utils::field_path::get_str_path;

/// One exposed schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Values path of the field
    pub path: String,
    /// `string`, `integer`, `number`, `boolean`, `array` or `object`
    pub type_name: String,
    /// Default, taken from the values tree
    pub default: Value,
}

/// Produces the schema fields of a values tree.
pub trait SchemaExtractor: Send + Sync {
    /// Extract fields, limited to `referenced` paths when given.
    ///
    /// # Errors
    ///
    /// Implementations backed by external schema documents report them here.
    fn extract(
        &self,
        values: &Value,
        referenced: Option<&BTreeSet<String>>,
    ) -> Result<Vec<SchemaField>>;
}

/// Type name of a value.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::String(_) => "string",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Infers fields from the values tree.
///
/// Without referenced paths, every leaf becomes a field: scalars, arrays (not
/// descended into) and empty objects. With referenced paths, exactly the
/// referenced nodes that exist become fields, at whatever depth they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferredSchemaExtractor;

impl InferredSchemaExtractor {
    fn leaves(value: &Value, path: &mut FieldPath, out: &mut Vec<SchemaField>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    path.push_key(key.clone());
                    Self::leaves(child, path, out);
                    path.pop();
                }
            }
            _ if path.is_empty() => {}
            _ => out.push(field(path, value)),
        }
    }
}

fn field(path: &FieldPath, value: &Value) -> SchemaField {
    SchemaField {
        path: path.to_string(),
        type_name: type_name(value).to_string(),
        default: value.clone(),
    }
}

impl SchemaExtractor for InferredSchemaExtractor {
    fn extract(
        &self,
        values: &Value,
        referenced: Option<&BTreeSet<String>>,
    ) -> Result<Vec<SchemaField>> {
        let mut fields = Vec::new();
        match referenced {
            None => Self::leaves(values, &mut FieldPath::root(), &mut fields),
            Some(paths) => {
                for path in paths {
                    let parsed = FieldPath::parse(path)?;
                    if let Some(value) = crate::utils::field_path::get(values, &parsed) {
                        fields.push(field(&parsed, value));
                    }
                }
            }
        }
        Ok(fields)
    }
}

/// Whether `values_path` is a schema field or lies inside one.
#[must_use]
pub fn is_covered(values_path: &str, fields: &[SchemaField]) -> bool {
    fields.iter().any(|f| {
        values_path == f.path
            || values_path
                .strip_prefix(f.path.as_str())
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
    })
}

/// Drop mappings whose values path no schema field covers.
///
/// A surviving substring mapping can still carry markers of dropped paths in
/// its tagged string. Those markers are turned back into the literal text of
/// their value so the rewritten field only references schema fields. When a
/// dropped value has no scalar text, every mapping of that field is dropped
/// and the field keeps its rendered value.
///
/// Returns the number of mappings removed.
pub fn prune_mappings(
    mappings: &mut Vec<FieldMapping>,
    fields: &[SchemaField],
    values: &Value,
) -> usize {
    let before = mappings.len();
    mappings.retain(|m| is_covered(&m.values_path, fields));

    let mut unresolved: BTreeSet<(String, String)> = BTreeSet::new();
    for mapping in mappings.iter_mut() {
        let Some(tagged) = mapping.sentinel_string.as_deref() else {
            continue;
        };
        match restore_uncovered(tagged, fields, values) {
            Some(restored) => mapping.sentinel_string = Some(restored),
            None => {
                unresolved.insert((mapping.resource_id.clone(), mapping.field_path.clone()));
            }
        }
    }
    if !unresolved.is_empty() {
        mappings.retain(|m| !unresolved.contains(&(m.resource_id.clone(), m.field_path.clone())));
    }
    before - mappings.len()
}

fn restore_uncovered(tagged: &str, fields: &[SchemaField], values: &Value) -> Option<String> {
    let mut restored = String::with_capacity(tagged.len());
    for piece in split(tagged) {
        match piece {
            Piece::Literal(text) => restored.push_str(text),
            Piece::Marker(path) if is_covered(path, fields) => restored.push_str(&marker(path)),
            Piece::Marker(path) => restored.push_str(&scalar_text(get_str_path(values, path)?)?),
        }
    }
    Some(restored)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
