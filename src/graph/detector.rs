//! Dependency detection from resource content.
//!
//! Each heuristic is a pure function of one resource's content that names the
//! resources it depends on. Targets are looked up by `Kind/name`; names that
//! do not belong to the package are ignored. Heuristics are additive and the
//! order they run in does not change the final edge set.
//!
//! | Heuristic | Source | Target |
//! |---|---|---|
//! | selector | Service `spec.selector`, PodDisruptionBudget `spec.selector.matchLabels` | pod-bearing workloads whose pod labels contain the selector |
//! | volumes | pod spec `volumes` | PersistentVolumeClaim, ConfigMap, Secret |
//! | service account | pod spec `serviceAccountName` | ServiceAccount |
//! | environment | `envFrom`, `env[].valueFrom` of containers and init containers | ConfigMap, Secret |
//! | pull secrets | pod spec `imagePullSecrets` | Secret |
//! | ingress | backend services | Service |
//! | RBAC bindings | `roleRef`, ServiceAccount `subjects` | Role/ClusterRole, ServiceAccount |
//! | autoscaler | `spec.scaleTargetRef` | the scaled workload |

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::{KindClass, PodTemplateLocation, Resource};
use crate::graph::DependencyGraph;
use crate::ids::ResourceIds;

/// A dependency named by kind and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetRef {
    /// Target kind
    pub kind: String,
    /// Target name
    pub name: String,
}

impl TargetRef {
    fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    fn qualified_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

fn str_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    lookup(value, keys).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

fn array_at<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    lookup(value, keys).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// The pod spec of a pod-bearing resource.
#[must_use]
pub fn pod_spec(resource: &Resource) -> Option<&Value> {
    match resource.class().pod_template()? {
        PodTemplateLocation::Template => lookup(&resource.object, &["spec", "template", "spec"]),
        PodTemplateLocation::JobTemplate => {
            lookup(&resource.object, &["spec", "jobTemplate", "spec", "template", "spec"])
        }
        PodTemplateLocation::Pod => lookup(&resource.object, &["spec"]),
    }
}

/// The labels pods of this resource carry.
#[must_use]
pub fn pod_labels(resource: &Resource) -> Option<&Map<String, Value>> {
    let labels = match resource.class().pod_template()? {
        PodTemplateLocation::Template => {
            lookup(&resource.object, &["spec", "template", "metadata", "labels"])
        }
        PodTemplateLocation::JobTemplate => lookup(
            &resource.object,
            &["spec", "jobTemplate", "spec", "template", "metadata", "labels"],
        ),
        PodTemplateLocation::Pod => lookup(&resource.object, &["metadata", "labels"]),
    };
    labels.and_then(Value::as_object)
}

/// The label selector of a resource that routes to or guards pods.
#[must_use]
pub fn pod_selector(resource: &Resource) -> Option<&Map<String, Value>> {
    let selector = match resource.class() {
        KindClass::Service => lookup(&resource.object, &["spec", "selector"]),
        KindClass::PodDisruptionBudget => {
            lookup(&resource.object, &["spec", "selector", "matchLabels"])
        }
        _ => None,
    };
    selector.and_then(Value::as_object).filter(|m| !m.is_empty())
}

/// Whether every selector entry is present in `labels`.
#[must_use]
pub fn selector_matches(selector: &Map<String, Value>, labels: &Map<String, Value>) -> bool {
    !selector.is_empty() && selector.iter().all(|(key, value)| labels.get(key) == Some(value))
}

fn volume_refs(spec: &Value, out: &mut Vec<TargetRef>) {
    for volume in array_at(spec, &["volumes"]) {
        if let Some(name) = str_at(volume, &["persistentVolumeClaim", "claimName"]) {
            out.push(TargetRef::new("PersistentVolumeClaim", name));
        }
        if let Some(name) = str_at(volume, &["configMap", "name"]) {
            out.push(TargetRef::new("ConfigMap", name));
        }
        if let Some(name) = str_at(volume, &["secret", "secretName"]) {
            out.push(TargetRef::new("Secret", name));
        }
        for source in array_at(volume, &["projected", "sources"]) {
            if let Some(name) = str_at(source, &["configMap", "name"]) {
                out.push(TargetRef::new("ConfigMap", name));
            }
            if let Some(name) = str_at(source, &["secret", "name"]) {
                out.push(TargetRef::new("Secret", name));
            }
        }
    }
}

fn service_account_ref(spec: &Value, out: &mut Vec<TargetRef>) {
    let name = str_at(spec, &["serviceAccountName"]).or_else(|| str_at(spec, &["serviceAccount"]));
    if let Some(name) = name {
        out.push(TargetRef::new("ServiceAccount", name));
    }
}

fn env_refs(spec: &Value, out: &mut Vec<TargetRef>) {
    let containers = array_at(spec, &["containers"]).iter();
    for container in containers.chain(array_at(spec, &["initContainers"])) {
        for source in array_at(container, &["envFrom"]) {
            if let Some(name) = str_at(source, &["configMapRef", "name"]) {
                out.push(TargetRef::new("ConfigMap", name));
            }
            if let Some(name) = str_at(source, &["secretRef", "name"]) {
                out.push(TargetRef::new("Secret", name));
            }
        }
        for var in array_at(container, &["env"]) {
            if let Some(name) = str_at(var, &["valueFrom", "configMapKeyRef", "name"]) {
                out.push(TargetRef::new("ConfigMap", name));
            }
            if let Some(name) = str_at(var, &["valueFrom", "secretKeyRef", "name"]) {
                out.push(TargetRef::new("Secret", name));
            }
        }
    }
}

fn pull_secret_refs(spec: &Value, out: &mut Vec<TargetRef>) {
    for secret in array_at(spec, &["imagePullSecrets"]) {
        if let Some(name) = str_at(secret, &["name"]) {
            out.push(TargetRef::new("Secret", name));
        }
    }
}

fn ingress_refs(object: &Value, out: &mut Vec<TargetRef>) {
    let mut add_backend = |backend: &Value| {
        let name =
            str_at(backend, &["service", "name"]).or_else(|| str_at(backend, &["serviceName"]));
        if let Some(name) = name {
            out.push(TargetRef::new("Service", name));
        }
    };
    if let Some(default) = lookup(object, &["spec", "defaultBackend"]) {
        add_backend(default);
    }
    for rule in array_at(object, &["spec", "rules"]) {
        for path in array_at(rule, &["http", "paths"]) {
            if let Some(backend) = path.get("backend") {
                add_backend(backend);
            }
        }
    }
}

fn binding_refs(object: &Value, out: &mut Vec<TargetRef>) {
    if let (Some(kind), Some(name)) =
        (str_at(object, &["roleRef", "kind"]), str_at(object, &["roleRef", "name"]))
    {
        out.push(TargetRef::new(kind, name));
    }
    for subject in array_at(object, &["subjects"]) {
        if str_at(subject, &["kind"]) == Some("ServiceAccount")
            && let Some(name) = str_at(subject, &["name"])
        {
            out.push(TargetRef::new("ServiceAccount", name));
        }
    }
}

fn scale_target_ref(object: &Value, out: &mut Vec<TargetRef>) {
    if let (Some(kind), Some(name)) = (
        str_at(object, &["spec", "scaleTargetRef", "kind"]),
        str_at(object, &["spec", "scaleTargetRef", "name"]),
    ) {
        out.push(TargetRef::new(kind, name));
    }
}

/// Every resource `resource` names by reference (not by selector).
#[must_use]
pub fn referenced_targets(resource: &Resource) -> Vec<TargetRef> {
    let mut targets = Vec::new();
    if let Some(spec) = pod_spec(resource) {
        volume_refs(spec, &mut targets);
        service_account_ref(spec, &mut targets);
        env_refs(spec, &mut targets);
        pull_secret_refs(spec, &mut targets);
    }
    match resource.class() {
        KindClass::Ingress => ingress_refs(&resource.object, &mut targets),
        KindClass::RoleBinding => binding_refs(&resource.object, &mut targets),
        KindClass::HorizontalPodAutoscaler => scale_target_ref(&resource.object, &mut targets),
        _ => {}
    }
    targets.sort();
    targets.dedup();
    targets
}

/// Populate `graph` with the edges implied by resource content.
///
/// Every resource must already be registered under its ID. Returns the number
/// of edges added.
pub fn detect_dependencies(
    graph: &mut DependencyGraph,
    resources: &[Resource],
    ids: &ResourceIds,
) -> usize {
    let index: HashMap<String, &str> = resources
        .iter()
        .filter_map(|r| ids.get(r).map(|id| (r.qualified_name(), id)))
        .collect();

    let workloads: Vec<(&str, &Map<String, Value>)> = resources
        .iter()
        .filter_map(|r| Some((ids.get(r)?, pod_labels(r)?)))
        .collect();

    let mut added = 0;
    for resource in resources {
        let Some(source) = ids.get(resource) else {
            continue;
        };

        if let Some(selector) = pod_selector(resource) {
            for (target, labels) in &workloads {
                if selector_matches(selector, labels) && graph.add_edge(source, target) {
                    tracing::debug!("{} selects {}", source, target);
                    added += 1;
                }
            }
        }

        for target in referenced_targets(resource) {
            if let Some(target_id) = index.get(&target.qualified_name())
                && graph.add_edge(source, target_id)
            {
                tracing::debug!("{} references {}", source, target_id);
                added += 1;
            }
        }
    }

    added
}
