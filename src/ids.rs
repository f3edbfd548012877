//! Resource identifier assignment.
//!
//! Every resource in a run gets a short, sanitized identifier that the graph
//! and the reference expressions use (`${deployment.status.readyReplicas}`).
//!
//! # Algorithm
//!
//! 1. Overrides keyed by `Kind/name` are applied verbatim, then sanitized.
//! 2. Remaining resources are grouped by lower-cased kind.
//! 3. A kind with a single resource uses the kind as its ID (`deployment`).
//! 4. Larger groups are disambiguated by name suffix: the smallest depth `d`
//!    for which the last `d` hyphen-separated name segments are unique across
//!    the group wins, giving `kind-suffix` (`deployment-api`, `deployment-web`).
//!    If no depth works (same name in several namespaces), the bare name is
//!    used and the collision scan below reports the clash.
//! 5. IDs are lower-cased, runs of characters outside `[a-z0-9]` become a
//!    single `-`, and leading/trailing hyphens are trimmed.
//! 6. Any two resources ending up with the same ID is a hard
//!    [`ChartGraphError::IdCollision`].

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use crate::core::{ChartGraphError, Resource};

/// Identifiers assigned to the resources of one run, keyed by match key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIds {
    by_key: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unused_overrides: Vec<String>,
}

impl ResourceIds {
    /// The ID of `resource`, if it was part of the run.
    #[must_use]
    pub fn get(&self, resource: &Resource) -> Option<&str> {
        self.by_key.get(&resource.match_key()).map(String::as_str)
    }

    /// The ID recorded for a match key.
    #[must_use]
    pub fn get_by_key(&self, match_key: &str) -> Option<&str> {
        self.by_key.get(match_key).map(String::as_str)
    }

    /// Iterate `(match key, id)` pairs in match-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All IDs, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_key.values().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Override keys (`Kind/name`) that matched no resource, sorted.
    #[must_use]
    pub fn unused_overrides(&self) -> &[String] {
        &self.unused_overrides
    }

    /// Number of assigned IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether no IDs were assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

fn invalid_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static pattern is valid"))
}

/// Normalize an identifier to `[a-z0-9-]` with single, inner hyphens.
///
/// A name made only of invalid characters sanitizes to the empty string.
#[must_use]
pub fn sanitize_id(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    invalid_runs().replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// The last `depth` hyphen-separated segments of `name`.
fn name_suffix(name: &str, depth: usize) -> String {
    let segments: Vec<&str> = name.split('-').collect();
    segments[segments.len().saturating_sub(depth)..].join("-")
}

/// IDs for a group of same-kind resources, aligned with `names`.
fn disambiguate(kind: &str, names: &[&str]) -> Vec<String> {
    let max_depth = names.iter().map(|n| n.split('-').count()).max().unwrap_or(1);

    for depth in 1..=max_depth {
        let suffixes: Vec<String> = names.iter().map(|n| name_suffix(n, depth)).collect();
        let distinct: HashSet<&String> = suffixes.iter().collect();
        if distinct.len() == suffixes.len() {
            return suffixes.into_iter().map(|suffix| format!("{kind}-{suffix}")).collect();
        }
    }

    names.iter().map(|name| (*name).to_string()).collect()
}

/// Assign an identifier to every resource.
///
/// `overrides` maps `Kind/name` to the desired ID.
///
/// # Errors
///
/// - [`ChartGraphError::DuplicateResource`] if two resources share a match key
/// - [`ChartGraphError::IdCollision`] if two resources end up with the same ID
pub fn assign_resource_ids(
    resources: &[Resource],
    overrides: &BTreeMap<String, String>,
) -> Result<ResourceIds> {
    let mut keys = HashSet::new();
    for resource in resources {
        if !keys.insert(resource.match_key()) {
            return Err(ChartGraphError::DuplicateResource {
                key: resource.match_key(),
            }
            .into());
        }
    }

    let mut assigned: Vec<Option<String>> = vec![None; resources.len()];
    let mut used_overrides = HashSet::new();

    for (index, resource) in resources.iter().enumerate() {
        let qualified = resource.qualified_name();
        if let Some(id) = overrides.get(&qualified) {
            used_overrides.insert(qualified);
            assigned[index] = Some(sanitize_id(id));
        }
    }
    let unused_overrides: Vec<String> = overrides
        .keys()
        .filter(|k| !used_overrides.contains(*k))
        .cloned()
        .collect();
    for key in &unused_overrides {
        tracing::warn!("ID override '{}' does not match any resource", key);
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, resource) in resources.iter().enumerate() {
        if assigned[index].is_none() {
            groups.entry(resource.kind().to_lowercase()).or_default().push(index);
        }
    }

    for (kind, members) in &groups {
        if let [only] = members.as_slice() {
            assigned[*only] = Some(sanitize_id(kind));
            continue;
        }
        let names: Vec<&str> = members.iter().map(|&i| resources[i].name.as_str()).collect();
        for (&index, id) in members.iter().zip(disambiguate(kind, &names)) {
            assigned[index] = Some(sanitize_id(&id));
        }
    }

    // Scan in match-key order so the reported pair does not depend on input order.
    let mut order: Vec<usize> = (0..resources.len()).collect();
    order.sort_by_key(|&i| resources[i].match_key());

    let mut owners: HashMap<String, usize> = HashMap::new();
    let mut by_key = BTreeMap::new();
    for index in order {
        let id = assigned[index].take().unwrap_or_default();
        if let Some(&first) = owners.get(&id) {
            return Err(ChartGraphError::IdCollision {
                id,
                first: resources[first].qualified_name(),
                second: resources[index].qualified_name(),
            }
            .into());
        }
        owners.insert(id.clone(), index);
        by_key.insert(resources[index].match_key(), id);
    }

    tracing::debug!("Assigned {} resource IDs", by_key.len());
    Ok(ResourceIds {
        by_key,
        unused_overrides,
    })
}
