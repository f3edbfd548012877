//! Reference analysis over realistic chart templates

use chartgraph::templating::{analyze_references, template_references};
use std::collections::BTreeMap;

const DEPLOYMENT: &str = r#"{{- define "app.labels" -}}
app: {{ .Chart.Name }}
release: {{ .Release.Name }}
{{- end -}}
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ .Release.Name }}-app
  labels:
    {{- include "app.labels" . | nindent 4 }}
spec:
  {{- if not .Values.autoscaling.enabled }}
  replicas: {{ .Values.replicaCount }}
  {{- end }}
  template:
    spec:
      {{- $registry := .Values.global.registry }}
      containers:
        - name: app
          image: "{{ $registry }}/{{ .Values.image.repository }}:{{ .Values.image.tag | default .Chart.AppVersion }}"
          {{- with .Values.resources }}
          resources:
            {{- toYaml . | nindent 12 }}
          {{- end }}
          env:
            {{- range $name, $value := .Values.env }}
            - name: {{ $name }}
              value: {{ $value | quote }}
            {{- end }}
            - name: FIRST_HOST
              value: {{ index .Values.ingress.hosts 0 "host" }}
      {{- if .Values.nodeSelector }}
      nodeSelector: {{ toYaml .Values.nodeSelector | nindent 8 }}
      {{- else if .Values.global.nodeSelector }}
      nodeSelector: {{ toYaml $.Values.global.nodeSelector | nindent 8 }}
      {{- end }}
"#;

/// `index` with literal keys reports only the full path, not its base.
#[test]
fn test_deployment_template_references() {
    let paths: Vec<String> = template_references(DEPLOYMENT).unwrap().into_iter().collect();
    assert_eq!(
        paths,
        vec![
            "autoscaling.enabled",
            "env",
            "global.nodeSelector",
            "global.registry",
            "image.repository",
            "image.tag",
            "ingress.hosts[0].host",
            "nodeSelector",
            "replicaCount",
            "resources",
        ]
    );
}

#[test]
fn test_comments_and_trim_markers_carry_no_references() {
    let src = "{{/* .Values.ignored */}}\n{{- .Values.kept -}}\n";
    let paths: Vec<String> = template_references(src).unwrap().into_iter().collect();
    assert_eq!(paths, vec!["kept"]);
}

#[test]
fn test_analysis_merges_templates_and_reports_failures() {
    let templates = BTreeMap::from([
        ("deployment.yaml".to_string(), DEPLOYMENT.to_string()),
        ("service.yaml".to_string(), "port: {{ .Values.service.port }}".to_string()),
        ("broken.yaml".to_string(), "{{ if .Values.x }}never closed".to_string()),
        ("NOTES.txt".to_string(), "Visit {{ .Values.ingress.hosts }}".to_string()),
    ]);
    let analysis = analyze_references(&templates);

    assert!(analysis.paths.contains("service.port"));
    assert!(analysis.paths.contains("replicaCount"));
    assert!(!analysis.paths.contains("x"));
    assert_eq!(analysis.skipped.len(), 1);
    assert_eq!(analysis.skipped[0].name, "broken.yaml");
}
