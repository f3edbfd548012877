//! Shared chart fixtures for the chartgraph test suites

// Not every suite uses every fixture
#![allow(dead_code)]

use chartgraph::core::Resource;
use chartgraph::test_utils::fixtures::{FakeLoader, manifest};
use serde_json::{Value, json};

/// A values leaf as template output: strings verbatim, anything else in its
/// JSON form.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Values of the `web` chart.
pub fn web_values() -> Value {
    json!({
        "replicaCount": 2,
        "image": {"repo": "nginx", "tag": "1.25"},
        "logLevel": "info",
        "service": {"port": 80}
    })
}

/// Render the `web` chart: a Deployment reading a ConfigMap and running as a
/// ServiceAccount, fronted by a Service.
pub fn render_web(values: &Value) -> Vec<Resource> {
    let image = format!("{}:{}", text(&values["image"]["repo"]), text(&values["image"]["tag"]));
    vec![
        manifest(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "labels": {"app": "web"}},
            "spec": {
                "replicas": values["replicaCount"],
                "selector": {"matchLabels": {"app": "web"}},
                "template": {
                    "metadata": {"labels": {"app": "web"}},
                    "spec": {
                        "serviceAccountName": "web",
                        "containers": [{
                            "name": "web",
                            "image": image,
                            "envFrom": [{"configMapRef": {"name": "web-config"}}]
                        }]
                    }
                }
            }
        })),
        manifest(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "web-config"},
            "data": {"LOG_LEVEL": values["logLevel"]}
        })),
        manifest(json!({
            "apiVersion": "v1",
            "kind": "ServiceAccount",
            "metadata": {"name": "web"}
        })),
        manifest(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web"},
            "spec": {
                "selector": {"app": "web"},
                "ports": [{"port": values["service"]["port"], "targetPort": "http"}]
            }
        })),
    ]
}

/// Template sources of the `web` chart, as far as reference analysis cares.
pub const WEB_TEMPLATES: &[(&str, &str)] = &[
    (
        "deployment.yaml",
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ include "web.fullname" . }}
spec:
  replicas: {{ .Values.replicaCount }}
  template:
    spec:
      {{- with .Values.image }}
      containers:
        - name: web
          image: "{{ .repo }}:{{ .tag }}"
      {{- end }}
"#,
    ),
    (
        "configmap.yaml",
        r#"kind: ConfigMap
data:
  LOG_LEVEL: {{ .Values.logLevel | quote }}
"#,
    ),
    ("serviceaccount.yaml", "kind: ServiceAccount\n"),
    (
        "service.yaml",
        r#"kind: Service
spec:
  ports:
    - port: {{ .Values.service.port }}
      targetPort: http
"#,
    ),
];

/// The `web` chart as a package.
pub fn web_chart() -> FakeLoader {
    WEB_TEMPLATES
        .iter()
        .fold(FakeLoader::rendering(web_values(), render_web), |loader, (name, source)| {
            loader.with_template(*name, *source)
        })
}
