//! Resource abstractions for chartgraph
//!
//! A [`Resource`] is one parsed Kubernetes manifest: its group/version/kind,
//! identity (name, optional namespace), labels and annotations, the sub-package
//! it came from, and the full generic object. The engine only reads the typed
//! header fields; the generic object is where inferred mappings are written.
//!
//! [`KindClass`] is the closed classification of kinds the dependency detector
//! and the status defaults care about. Anything else is [`KindClass::Other`].

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Group, version and kind of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    /// API group; empty for the core group
    pub group: String,
    /// API version (e.g. `v1`)
    pub version: String,
    /// Kind (e.g. `Deployment`)
    pub kind: String,
}

impl Gvk {
    /// Split an `apiVersion` string (`apps/v1`, `v1`) and pair it with a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        let (group, version) = match api_version.rsplit_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), api_version.to_string()),
        };
        Self {
            group,
            version,
            kind: kind.into(),
        }
    }

    /// Rebuild the `apiVersion` string.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Group/version/kind
    pub gvk: Gvk,
    /// `metadata.name`
    pub name: String,
    /// `metadata.namespace`, if set
    pub namespace: Option<String>,
    /// `metadata.labels`
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// `metadata.annotations`
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Sub-package that produced the resource; empty for the root package
    #[serde(default)]
    pub origin: String,
    /// The full generic representation of the manifest
    pub object: Value,
}

impl Resource {
    /// Build a resource from a generic manifest object.
    ///
    /// # Errors
    ///
    /// Fails when the value is not an object or lacks `kind`, `apiVersion` or
    /// `metadata.name`.
    pub fn from_value(object: Value, origin: impl Into<String>) -> Result<Self> {
        let Some(map) = object.as_object() else {
            bail!("manifest is not an object");
        };
        let Some(kind) = map.get("kind").and_then(Value::as_str) else {
            bail!("manifest has no kind");
        };
        let Some(api_version) = map.get("apiVersion").and_then(Value::as_str) else {
            bail!("manifest '{kind}' has no apiVersion");
        };
        let metadata = map.get("metadata");
        let Some(name) = metadata.and_then(|m| m.get("name")).and_then(Value::as_str) else {
            bail!("manifest '{kind}' has no metadata.name");
        };
        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        Ok(Self {
            gvk: Gvk::from_api_version(api_version, kind),
            name: name.to_string(),
            namespace,
            labels: string_map(metadata.and_then(|m| m.get("labels"))),
            annotations: string_map(metadata.and_then(|m| m.get("annotations"))),
            origin: origin.into(),
            object,
        })
    }

    /// The resource kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    /// `Kind/name`, the key used by ID overrides and reference lookups.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.gvk.kind, self.name)
    }

    /// `Kind/namespace/name`, or `Kind/name` without a namespace.
    ///
    /// Pairs the same resource across two renderings of a package.
    #[must_use]
    pub fn match_key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}/{}", self.gvk.kind, ns, self.name),
            None => self.qualified_name(),
        }
    }

    /// Whether the generic representation carries any fields.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.object.as_object().is_some_and(|m| !m.is_empty())
    }

    /// Classification of this resource's kind.
    #[must_use]
    pub fn class(&self) -> KindClass {
        KindClass::of(&self.gvk.kind)
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Where a kind keeps its pod template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodTemplateLocation {
    /// `spec.template` (Deployment, StatefulSet, DaemonSet, ReplicaSet, Job)
    Template,
    /// `spec.jobTemplate.spec.template` (CronJob)
    JobTemplate,
    /// The object itself (Pod)
    Pod,
}

/// Closed classification of the kinds the engine has knowledge about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    /// Deployment, StatefulSet, DaemonSet or ReplicaSet
    Workload,
    /// Job
    Job,
    /// CronJob
    CronJob,
    /// Pod
    Pod,
    /// Service
    Service,
    /// ConfigMap
    ConfigMap,
    /// Secret
    Secret,
    /// ServiceAccount
    ServiceAccount,
    /// PersistentVolumeClaim
    PersistentVolumeClaim,
    /// Ingress
    Ingress,
    /// RoleBinding or ClusterRoleBinding
    RoleBinding,
    /// Role or ClusterRole
    Role,
    /// PodDisruptionBudget
    PodDisruptionBudget,
    /// HorizontalPodAutoscaler
    HorizontalPodAutoscaler,
    /// Anything else
    Other,
}

impl KindClass {
    /// Classify a kind name.
    #[must_use]
    pub fn of(kind: &str) -> Self {
        match kind {
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => Self::Workload,
            "Job" => Self::Job,
            "CronJob" => Self::CronJob,
            "Pod" => Self::Pod,
            "Service" => Self::Service,
            "ConfigMap" => Self::ConfigMap,
            "Secret" => Self::Secret,
            "ServiceAccount" => Self::ServiceAccount,
            "PersistentVolumeClaim" => Self::PersistentVolumeClaim,
            "Ingress" => Self::Ingress,
            "RoleBinding" | "ClusterRoleBinding" => Self::RoleBinding,
            "Role" | "ClusterRole" => Self::Role,
            "PodDisruptionBudget" => Self::PodDisruptionBudget,
            "HorizontalPodAutoscaler" => Self::HorizontalPodAutoscaler,
            _ => Self::Other,
        }
    }

    /// Where pods are described for pod-bearing kinds.
    #[must_use]
    pub const fn pod_template(self) -> Option<PodTemplateLocation> {
        match self {
            Self::Workload | Self::Job => Some(PodTemplateLocation::Template),
            Self::CronJob => Some(PodTemplateLocation::JobTemplate),
            Self::Pod => Some(PodTemplateLocation::Pod),
            _ => None,
        }
    }
}
