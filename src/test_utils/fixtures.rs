//! Test fixtures for resources and in-memory packages

use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::core::Resource;
use crate::package::{LoadedPackage, PackageLoader};

fn api_version_for(kind: &str) -> &'static str {
    match kind {
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" => "apps/v1",
        "Job" | "CronJob" => "batch/v1",
        "Ingress" | "NetworkPolicy" => "networking.k8s.io/v1",
        "HorizontalPodAutoscaler" => "autoscaling/v2",
        "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => {
            "rbac.authorization.k8s.io/v1"
        }
        _ => "v1",
    }
}

/// A bare resource with only `apiVersion`, `kind` and `metadata.name`.
pub fn resource(kind: &str, name: &str) -> Resource {
    manifest(json!({
        "apiVersion": api_version_for(kind),
        "kind": kind,
        "metadata": {"name": name}
    }))
}

/// A resource from a full manifest of the root package.
///
/// # Panics
///
/// Panics if the manifest lacks `kind`, `apiVersion` or `metadata.name`.
pub fn manifest(object: Value) -> Resource {
    Resource::from_value(object, "").expect("fixture manifest should be valid")
}

type RenderFn = Box<dyn Fn(&Value) -> Vec<Resource> + Send + Sync>;

/// An in-memory [`PackageLoader`].
///
/// Either serves a fixed resource list, ignoring the values it is rendered
/// with, or renders through a closure so sentinel values flow into the
/// output the way a template engine would place them.
pub struct FakeLoader {
    values: Value,
    templates: BTreeMap<String, String>,
    baseline: Vec<Resource>,
    render: Option<RenderFn>,
    failure: Option<String>,
}

impl FakeLoader {
    /// Serve `resources` for every render.
    pub fn new(resources: Vec<Resource>, values: Value) -> Self {
        Self {
            values,
            templates: BTreeMap::new(),
            baseline: resources,
            render: None,
            failure: None,
        }
    }

    /// Render through `render`; the baseline is `render(&values)`.
    pub fn rendering(
        values: Value,
        render: impl Fn(&Value) -> Vec<Resource> + Send + Sync + 'static,
    ) -> Self {
        let baseline = render(&values);
        Self {
            values,
            templates: BTreeMap::new(),
            baseline,
            render: Some(Box::new(render)),
            failure: None,
        }
    }

    /// Fail every call with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(Vec::new(), Value::Null)
        }
    }

    /// Add a template source.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

impl PackageLoader for FakeLoader {
    fn load(&self) -> Result<LoadedPackage> {
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(LoadedPackage {
            resources: self.baseline.clone(),
            values: self.values.clone(),
            templates: self.templates.clone(),
        })
    }

    fn render_with_values(&self, values: &Value) -> Result<Vec<Resource>> {
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(match &self.render {
            Some(render) => render(values),
            None => self.baseline.clone(),
        })
    }
}
