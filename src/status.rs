//! Readiness conditions and status projections.
//!
//! Every output resource carries a [`StatusFields`]: expressions telling the
//! orchestrator when the resource is ready and which of its status fields are
//! exposed. Kind knowledge comes from two places:
//!
//! 1. a caller-supplied [`TransformerRegistry`], consulted first;
//! 2. the built-in table below, a closed list of `(predicate, behavior)` rows
//!    ending in a wildcard row that matches everything.
//!
//! When the desired side of a readiness comparison is itself parameterized
//! (an exact mapping targets `spec.replicas`), the condition compares against
//! the schema field instead of the resource's own copy.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;

use crate::core::{KindClass, Resource};
use crate::expression::{schema_ref, self_ref};
use crate::inference::{FieldMapping, MatchKind};
use crate::utils::field_path;

/// Status expressions of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFields {
    /// Exposed name → expression
    pub projections: BTreeMap<String, String>,
    /// Conditions that must all hold for the resource to be ready
    pub ready_when: Vec<String>,
}

/// Supplies status expressions for resources the caller knows better.
pub trait TransformerRegistry: Send + Sync {
    /// Status of `resource`, or `None` to fall back to the built-in defaults.
    ///
    /// `mappings` are the mappings of this resource only. Long-running
    /// implementations should observe `cancel`.
    fn transform(
        &self,
        resource: &Resource,
        id: &str,
        mappings: &[FieldMapping],
        cancel: &CancellationToken,
    ) -> Option<Result<StatusFields>>;
}

/// Per-kind status function.
pub type KindTransformer =
    Box<dyn Fn(&Resource, &str, &[FieldMapping]) -> Result<StatusFields> + Send + Sync>;

/// A [`TransformerRegistry`] keyed by kind name.
#[derive(Default)]
pub struct KindRegistry {
    by_kind: HashMap<String, KindTransformer>,
}

impl KindRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `transformer` for every resource of `kind`.
    #[must_use]
    pub fn register(mut self, kind: impl Into<String>, transformer: KindTransformer) -> Self {
        self.by_kind.insert(kind.into(), transformer);
        self
    }
}

impl TransformerRegistry for KindRegistry {
    fn transform(
        &self,
        resource: &Resource,
        id: &str,
        mappings: &[FieldMapping],
        _cancel: &CancellationToken,
    ) -> Option<Result<StatusFields>> {
        let transformer = self.by_kind.get(resource.kind())?;
        Some(transformer(resource, id, mappings))
    }
}

#[derive(Debug, Clone, Copy)]
enum Readiness {
    /// `self.<actual> == <desired>`
    Equal(&'static str, &'static str),
    /// `status.phase` equals the given phase
    Phase(&'static str),
    /// A `status.conditions` entry of the given type is `True`
    Condition(&'static str),
    /// The field exists
    Present(&'static str),
}

struct KindDefaults {
    applies: fn(&Resource) -> bool,
    projections: &'static [(&'static str, &'static str)],
    ready_when: &'static [Readiness],
}

fn is_kind(resource: &Resource, kind: &str) -> bool {
    resource.kind() == kind
}

fn is_load_balancer(resource: &Resource) -> bool {
    resource.class() == KindClass::Service
        && field_path::get_str_path(&resource.object, "spec.type").and_then(|v| v.as_str())
            == Some("LoadBalancer")
}

/// Checked top to bottom; the last row matches everything.
const DEFAULTS: &[KindDefaults] = &[
    KindDefaults {
        applies: |r| is_kind(r, "DaemonSet"),
        projections: &[("numberReady", "status.numberReady")],
        ready_when: &[Readiness::Equal("status.numberReady", "status.desiredNumberScheduled")],
    },
    KindDefaults {
        applies: |r| is_kind(r, "StatefulSet"),
        projections: &[("readyReplicas", "status.readyReplicas")],
        ready_when: &[Readiness::Equal("status.readyReplicas", "spec.replicas")],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::Workload,
        projections: &[
            ("availableReplicas", "status.availableReplicas"),
            ("readyReplicas", "status.readyReplicas"),
        ],
        ready_when: &[Readiness::Equal("status.availableReplicas", "spec.replicas")],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::Job,
        projections: &[("succeeded", "status.succeeded")],
        ready_when: &[Readiness::Condition("Complete")],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::CronJob,
        projections: &[("lastScheduleTime", "status.lastScheduleTime")],
        ready_when: &[],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::Pod,
        projections: &[("podIP", "status.podIP"), ("phase", "status.phase")],
        ready_when: &[Readiness::Phase("Running")],
    },
    KindDefaults {
        applies: is_load_balancer,
        projections: &[
            ("clusterIP", "spec.clusterIP"),
            ("loadBalancerIngress", "status.loadBalancer.ingress"),
        ],
        ready_when: &[Readiness::Present("status.loadBalancer.ingress")],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::Service,
        projections: &[("clusterIP", "spec.clusterIP")],
        ready_when: &[],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::PersistentVolumeClaim,
        projections: &[("phase", "status.phase")],
        ready_when: &[Readiness::Phase("Bound")],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::Ingress,
        projections: &[("loadBalancerIngress", "status.loadBalancer.ingress")],
        ready_when: &[],
    },
    KindDefaults {
        applies: |r| r.class() == KindClass::HorizontalPodAutoscaler,
        projections: &[("currentReplicas", "status.currentReplicas")],
        ready_when: &[],
    },
    KindDefaults {
        applies: |_| true,
        projections: &[],
        ready_when: &[],
    },
];

/// The schema path a field was exactly mapped to, if any.
fn mapped_schema_field<'a>(field: &str, mappings: &'a [FieldMapping]) -> Option<&'a str> {
    mappings
        .iter()
        .find(|m| m.kind == MatchKind::Exact && m.field_path == field)
        .map(|m| m.values_path.as_str())
}

/// Strip the `${...}` wrapper of a single reference.
fn unwrap_ref(expression: &str) -> &str {
    expression
        .strip_prefix("${")
        .and_then(|e| e.strip_suffix('}'))
        .unwrap_or(expression)
}

impl Readiness {
    fn expression(self, mappings: &[FieldMapping]) -> String {
        match self {
            Self::Equal(actual, desired) => {
                let desired = mapped_schema_field(desired, mappings)
                    .map_or_else(|| self_ref(desired), schema_ref);
                format!("${{self.{actual} == {}}}", unwrap_ref(&desired))
            }
            Self::Phase(phase) => format!("${{self.status.phase == \"{phase}\"}}"),
            Self::Condition(kind) => format!(
                "${{self.status.conditions.exists(c, c.type == \"{kind}\" && c.status == \"True\")}}"
            ),
            Self::Present(field) => format!("${{has(self.{field})}}"),
        }
    }
}

/// Built-in status of a resource.
///
/// `mappings` should be the mappings of this resource only.
#[must_use]
pub fn default_status(resource: &Resource, mappings: &[FieldMapping]) -> StatusFields {
    let Some(defaults) = DEFAULTS.iter().find(|d| (d.applies)(resource)) else {
        return StatusFields::default();
    };
    StatusFields {
        projections: defaults
            .projections
            .iter()
            .map(|(name, field)| ((*name).to_string(), self_ref(field)))
            .collect(),
        ready_when: defaults.ready_when.iter().map(|r| r.expression(mappings)).collect(),
    }
}
