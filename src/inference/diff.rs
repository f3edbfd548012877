//! Sentinel diff engine.
//!
//! Pairs every baseline resource with its counterpart from the sentinel render
//! (same match key) and walks both trees in lock step. Wherever the sentinel
//! tree holds a marker string, the value at that values path flowed into the
//! field:
//!
//! - the whole string is one marker: an [`super::MatchKind::Exact`] mapping
//! - markers embedded in a larger string: one [`super::MatchKind::Substring`] mapping
//!   per distinct marker, each carrying the raw tagged string so the
//!   interpolation can be rebuilt later
//!
//! # Concurrency
//!
//! Each resource pair is an independent unit. [`DiffEngine::diff_concurrent`]
//! runs units on the blocking pool as a stream buffered to `workers` in-flight
//! units. `buffered` yields results in unit order, so the concurrent and
//! sequential paths produce the same report. A unit that errors or panics is
//! recorded as a [`UnitFault`] and the other units still contribute their
//! mappings.

use anyhow::{Result, bail};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::FieldMapping;
use super::sentinel;
use crate::config::ConcurrencyConfig;
use crate::constants::MAX_WALK_DEPTH;
use crate::core::Resource;
use crate::ids::ResourceIds;
use crate::utils::FieldPath;

/// One baseline/sentinel resource pair.
#[derive(Debug, Clone)]
pub struct DiffUnit {
    /// ID of the baseline resource
    pub resource_id: String,
    /// Baseline manifest
    pub baseline: Value,
    /// Sentinel manifest
    pub sentinel: Value,
}

/// A unit that failed while the rest of the diff went on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFault {
    /// Resource ID of the failed unit
    pub unit: String,
    /// Error message or panic payload
    pub reason: String,
}

/// Mappings and faults of one diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Mappings in unit order, then walk order
    pub mappings: Vec<FieldMapping>,
    /// Failed units in unit order
    pub faults: Vec<UnitFault>,
}

/// Pair baseline and sentinel resources by match key.
///
/// Baseline resources without an ID, without a counterpart, or with an empty
/// manifest on either side are skipped.
#[must_use]
pub fn pair_resources(
    baseline: &[Resource],
    sentinel: &[Resource],
    ids: &ResourceIds,
) -> Vec<DiffUnit> {
    let by_key: HashMap<String, &Resource> = sentinel.iter().map(|r| (r.match_key(), r)).collect();

    let mut units = Vec::new();
    for resource in baseline {
        let Some(id) = ids.get(resource) else {
            continue;
        };
        let Some(counterpart) = by_key.get(&resource.match_key()) else {
            tracing::debug!("No sentinel counterpart for {}, skipping", resource.qualified_name());
            continue;
        };
        if !resource.has_content() || !counterpart.has_content() {
            tracing::debug!("Empty manifest for {}, skipping", resource.qualified_name());
            continue;
        }
        units.push(DiffUnit {
            resource_id: id.to_string(),
            baseline: resource.object.clone(),
            sentinel: counterpart.object.clone(),
        });
    }
    units
}

/// Diff one pair of manifests.
///
/// # Errors
///
/// Fails if the manifests nest deeper than [`MAX_WALK_DEPTH`].
pub fn diff_pair(
    resource_id: &str,
    baseline: &Value,
    sentinel: &Value,
) -> Result<Vec<FieldMapping>> {
    let mut mappings = Vec::new();
    let mut path = FieldPath::root();
    walk(resource_id, baseline, sentinel, &mut path, 0, &mut mappings)?;
    Ok(mappings)
}

fn walk(
    resource_id: &str,
    baseline: &Value,
    sentinel: &Value,
    path: &mut FieldPath,
    depth: usize,
    out: &mut Vec<FieldMapping>,
) -> Result<()> {
    if depth > MAX_WALK_DEPTH {
        bail!("manifest nests deeper than {MAX_WALK_DEPTH} levels at '{path}'");
    }

    match (baseline, sentinel) {
        (Value::Object(base), Value::Object(tagged)) => {
            for (key, tagged_child) in tagged {
                let Some(base_child) = base.get(key) else {
                    continue;
                };
                path.push_key(key.clone());
                walk(resource_id, base_child, tagged_child, path, depth + 1, out)?;
                path.pop();
            }
        }
        (Value::Array(base), Value::Array(tagged)) => {
            for (index, (base_child, tagged_child)) in base.iter().zip(tagged).enumerate() {
                path.push_index(index);
                walk(resource_id, base_child, tagged_child, path, depth + 1, out)?;
                path.pop();
            }
        }
        (_, Value::String(tagged)) => record(resource_id, tagged, path, out),
        _ => {}
    }
    Ok(())
}

fn record(resource_id: &str, tagged: &str, path: &FieldPath, out: &mut Vec<FieldMapping>) {
    if let Some(values_path) = sentinel::exact_marker(tagged) {
        out.push(FieldMapping::exact(values_path, resource_id, path.to_string()));
        return;
    }
    for values_path in sentinel::embedded_paths(tagged) {
        out.push(FieldMapping::substring(values_path, resource_id, path.to_string(), tagged));
    }
}

fn unit_diff(unit: &DiffUnit) -> Result<Vec<FieldMapping>> {
    diff_pair(&unit.resource_id, &unit.baseline, &unit.sentinel)
}

/// Runs sentinel diffs, sequentially or on a bounded worker pool.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    concurrency: ConcurrencyConfig,
}

impl DiffEngine {
    /// Create an engine with the given pool settings.
    #[must_use]
    pub const fn new(concurrency: ConcurrencyConfig) -> Self {
        Self { concurrency }
    }

    /// Diff all pairs on the current thread.
    #[must_use]
    pub fn diff(
        &self,
        baseline: &[Resource],
        sentinel: &[Resource],
        ids: &ResourceIds,
    ) -> DiffReport {
        let units = pair_resources(baseline, sentinel, ids);
        let mut report = DiffReport::default();
        for unit in &units {
            match unit_diff(unit) {
                Ok(mappings) => report.mappings.extend(mappings),
                Err(e) => report.faults.push(fault(&unit.resource_id, format!("{e:#}"))),
            }
        }
        report
    }

    /// Diff all pairs on the blocking pool, at most `workers` at a time.
    pub async fn diff_concurrent(
        &self,
        baseline: &[Resource],
        sentinel: &[Resource],
        ids: &ResourceIds,
    ) -> DiffReport {
        let units = pair_resources(baseline, sentinel, ids);
        run_pool(units, self.concurrency.worker_count(), unit_diff).await
    }

    /// Pick the concurrent path when enabled and there are enough pairs.
    pub async fn run(
        &self,
        baseline: &[Resource],
        sentinel: &[Resource],
        ids: &ResourceIds,
    ) -> DiffReport {
        let pairs = baseline.len().min(sentinel.len());
        if self.concurrency.use_concurrency(pairs) {
            tracing::debug!(
                "Diffing {} resources with {} workers",
                pairs,
                self.concurrency.worker_count()
            );
            self.diff_concurrent(baseline, sentinel, ids).await
        } else {
            tracing::debug!("Diffing {} resources sequentially", pairs);
            self.diff(baseline, sentinel, ids)
        }
    }
}

fn fault(unit: &str, reason: String) -> UnitFault {
    tracing::warn!("Sentinel diff failed for '{}': {}", unit, reason);
    UnitFault {
        unit: unit.to_string(),
        reason,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

async fn run_pool<F>(units: Vec<DiffUnit>, workers: usize, work: F) -> DiffReport
where
    F: Fn(&DiffUnit) -> Result<Vec<FieldMapping>> + Send + Sync + 'static,
{
    let work = Arc::new(work);

    let outcomes: Vec<(String, Result<Vec<FieldMapping>, String>)> = stream::iter(units)
        .map(|unit| {
            let work = Arc::clone(&work);
            async move {
                let label = unit.resource_id.clone();
                let outcome = match tokio::task::spawn_blocking(move || work(&unit)).await {
                    Ok(Ok(mappings)) => Ok(mappings),
                    Ok(Err(e)) => Err(format!("{e:#}")),
                    Err(join) if join.is_panic() => Err(panic_message(join.into_panic().as_ref())),
                    Err(join) => Err(join.to_string()),
                };
                (label, outcome)
            }
        })
        .buffered(workers.max(1)) // Bounded, and keeps unit order
        .collect()
        .await;

    let mut report = DiffReport::default();
    for (label, outcome) in outcomes {
        match outcome {
            Ok(mappings) => report.mappings.extend(mappings),
            Err(reason) => report.faults.push(fault(&label, reason)),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::assign_resource_ids;
    use crate::inference::sentinel::marker;
    use crate::test_utils::fixtures::manifest;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn deployment(image: &str, replicas: Value) -> Resource {
        manifest(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {
                "replicas": replicas,
                "template": {"spec": {"containers": [{"name": "web", "image": image}]}}
            }
        }))
    }

    #[test]
    fn test_exact_and_substring_mappings() {
        let baseline = vec![deployment("nginx:1.25", json!(3))];
        let tagged_image = format!("{}:{}", marker("image.repository"), marker("image.tag"));
        let sentinel = vec![deployment(&tagged_image, json!(marker("replicaCount")))];
        let ids = assign_resource_ids(&baseline, &BTreeMap::new()).unwrap();

        let report = DiffEngine::default().diff(&baseline, &sentinel, &ids);
        assert!(report.faults.is_empty());
        assert_eq!(
            report.mappings,
            vec![
                FieldMapping::exact("replicaCount", "deployment", "spec.replicas"),
                FieldMapping::substring(
                    "image.repository",
                    "deployment",
                    "spec.template.spec.containers[0].image",
                    &tagged_image
                ),
                FieldMapping::substring(
                    "image.tag",
                    "deployment",
                    "spec.template.spec.containers[0].image",
                    &tagged_image
                ),
            ]
        );
    }

    #[test]
    fn test_unmatched_resources_skipped() {
        let baseline = vec![deployment("nginx", json!(1))];
        let ids = assign_resource_ids(&baseline, &BTreeMap::new()).unwrap();
        let report = DiffEngine::default().diff(&baseline, &[], &ids);
        assert_eq!(report, DiffReport::default());
    }

    #[test]
    fn test_untagged_fields_produce_nothing() {
        let baseline = vec![deployment("nginx", json!(1))];
        let ids = assign_resource_ids(&baseline, &BTreeMap::new()).unwrap();
        let report = DiffEngine::default().diff(&baseline, &baseline, &ids);
        assert!(report.mappings.is_empty());
    }

    #[test]
    fn test_depth_limit_is_a_fault() {
        let mut deep = json!("leaf");
        for _ in 0..=MAX_WALK_DEPTH + 1 {
            deep = json!({ "n": deep });
        }
        assert!(diff_pair("deep", &deep, &deep).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let mut baseline = Vec::new();
        let mut sentinel = Vec::new();
        for i in 0..8 {
            let name = format!("svc-{i}");
            let object = |port: Value| {
                manifest(json!({
                    "apiVersion": "v1",
                    "kind": "Service",
                    "metadata": {"name": name},
                    "spec": {"ports": [{"port": port}]}
                }))
            };
            baseline.push(object(json!(80 + i)));
            sentinel.push(object(json!(marker(&format!("services[{i}].port")))));
        }
        let ids = assign_resource_ids(&baseline, &BTreeMap::new()).unwrap();

        let engine = DiffEngine::new(ConcurrencyConfig {
            workers: Some(3),
            ..ConcurrencyConfig::default()
        });
        let sequential = engine.diff(&baseline, &sentinel, &ids);
        let concurrent = engine.diff_concurrent(&baseline, &sentinel, &ids).await;
        assert_eq!(sequential.mappings.len(), 8);
        assert_eq!(sequential, concurrent);
        assert_eq!(engine.run(&baseline, &sentinel, &ids).await, sequential);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_isolated() {
        let units: Vec<DiffUnit> = ["a", "boom", "c"]
            .iter()
            .map(|id| DiffUnit {
                resource_id: (*id).to_string(),
                baseline: json!({"x": "1"}),
                sentinel: json!({"x": marker("x")}),
            })
            .collect();

        let report = run_pool(units, 2, |unit| {
            assert!(unit.resource_id != "boom", "unit exploded");
            unit_diff(unit)
        })
        .await;

        assert_eq!(report.mappings.len(), 2);
        assert_eq!(report.mappings[0].resource_id, "a");
        assert_eq!(report.mappings[1].resource_id, "c");
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].unit, "boom");
        assert!(report.faults[0].reason.contains("unit exploded"));
    }
}
