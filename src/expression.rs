//! Reference expression synthesis.
//!
//! Mappings become `${...}` references in the output resources:
//!
//! | Reference | Form |
//! |---|---|
//! | schema field | `${schema.spec.image.tag}` |
//! | own field | `${self.status.readyReplicas}` |
//! | other resource | `${deployment.status.availableReplicas}` |
//!
//! An exact mapping replaces the field by a single schema reference. A
//! substring mapping replaces it by an interpolation: the literal text of the
//! tagged string stays as is and every marker becomes a schema reference, so
//! `"<repo>:<tag>"` turns into `${schema.spec.image.repo}:${schema.spec.image.tag}`.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::SCHEMA_REF_ROOT;
use crate::core::Resource;
use crate::ids::ResourceIds;
use crate::inference::sentinel::{Piece, split};
use crate::inference::{FieldMapping, MatchKind};
use crate::utils::field_path::{self, FieldPath};

fn join(root: &str, path: &str) -> String {
    if path.is_empty() {
        root.to_string()
    } else if path.starts_with('[') {
        format!("{root}{path}")
    } else {
        format!("{root}.{path}")
    }
}

/// `${schema.spec.<path>}`
#[must_use]
pub fn schema_ref(values_path: &str) -> String {
    format!("${{{}}}", join(SCHEMA_REF_ROOT, values_path))
}

/// `${self.<field>}`
#[must_use]
pub fn self_ref(field: &str) -> String {
    format!("${{{}}}", join("self", field))
}

/// `${<id>.<field>}`
#[must_use]
pub fn resource_ref(resource_id: &str, field: &str) -> String {
    format!("${{{}}}", join(resource_id, field))
}

/// Turn a sentinel-tagged string into an interpolation expression.
#[must_use]
pub fn interpolate(tagged: &str) -> String {
    split(tagged)
        .into_iter()
        .map(|piece| match piece {
            Piece::Literal(text) => text.to_string(),
            Piece::Marker(path) => schema_ref(path),
        })
        .collect()
}

/// The expression that replaces the mapped field.
#[must_use]
pub fn expression_for(mapping: &FieldMapping) -> String {
    match (mapping.kind, &mapping.sentinel_string) {
        (MatchKind::Substring, Some(tagged)) => interpolate(tagged),
        _ => schema_ref(&mapping.values_path),
    }
}

/// Overwrite every mapped field with its expression.
///
/// Mappings are grouped by resource ID, then field path; when several
/// mappings target the same field, the first one in `mappings` wins.
/// Returns the number of fields rewritten.
///
/// # Errors
///
/// Fails if a mapping's field path is malformed or cannot be written.
pub fn apply_mappings(
    resources: &mut [Resource],
    ids: &ResourceIds,
    mappings: &[FieldMapping],
) -> Result<usize> {
    let mut by_resource: BTreeMap<&str, BTreeMap<&str, &FieldMapping>> = BTreeMap::new();
    for mapping in mappings {
        by_resource
            .entry(mapping.resource_id.as_str())
            .or_default()
            .entry(mapping.field_path.as_str())
            .or_insert(mapping);
    }

    let mut applied = 0;
    for resource in resources.iter_mut() {
        let Some(id) = ids.get(resource).map(str::to_string) else {
            continue;
        };
        let Some(fields) = by_resource.remove(id.as_str()) else {
            continue;
        };
        for (field, mapping) in fields {
            let path = FieldPath::parse(field)?;
            field_path::set(&mut resource.object, &path, Value::String(expression_for(mapping)))
                .with_context(|| format!("Failed to apply mapping to {} at '{}'", id, field))?;
            applied += 1;
        }
    }

    for id in by_resource.keys() {
        tracing::warn!("Mappings reference unknown resource ID '{}'", id);
    }
    tracing::debug!("Applied {} field mappings", applied);
    Ok(applied)
}
