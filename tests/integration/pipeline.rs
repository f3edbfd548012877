//! Full pipeline runs over the `web` chart

use anyhow::Result;
use chartgraph::config::TransformConfig;
use chartgraph::inference::MatchKind;
use chartgraph::pipeline::Pipeline;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::web_chart;

#[tokio::test]
async fn test_web_chart_end_to_end() -> Result<()> {
    chartgraph::test_utils::init_test_logging(None);

    let result = Pipeline::new(TransformConfig::default())
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    let mut ids = result.ids.ids();
    ids.sort_unstable();
    assert_eq!(ids, vec!["configmap", "deployment", "service", "serviceaccount"]);

    // Dependencies first; ties alphabetical
    assert_eq!(result.order, vec!["configmap", "serviceaccount", "deployment", "service"]);
    assert_eq!(result.graph.dependencies_of("deployment"), vec!["configmap", "serviceaccount"]);
    assert_eq!(result.graph.dependencies_of("service"), vec!["deployment"]);
    assert_eq!(result.graph.edge_count(), 3);
    assert!(result.warnings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_mapped_fields_become_references() -> Result<()> {
    let result = Pipeline::new(TransformConfig::default())
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    let deployment = result
        .resources
        .iter()
        .find(|r| r.kind() == "Deployment")
        .expect("deployment survives the run");
    assert_eq!(deployment.object["spec"]["replicas"], json!("${schema.spec.replicaCount}"));
    assert_eq!(
        deployment.object["spec"]["template"]["spec"]["containers"][0]["image"],
        json!("${schema.spec.image.repo}:${schema.spec.image.tag}")
    );
    // Unmapped literals stay untouched
    assert_eq!(deployment.object["metadata"]["name"], json!("web"));

    let service = result.resources.iter().find(|r| r.kind() == "Service").expect("service");
    assert_eq!(service.object["spec"]["ports"][0]["port"], json!("${schema.spec.service.port}"));
    assert_eq!(service.object["spec"]["ports"][0]["targetPort"], json!("http"));

    let configmap = result.resources.iter().find(|r| r.kind() == "ConfigMap").expect("configmap");
    assert_eq!(configmap.object["data"]["LOG_LEVEL"], json!("${schema.spec.logLevel}"));
    Ok(())
}

#[tokio::test]
async fn test_mappings_sorted_and_classified() -> Result<()> {
    let result = Pipeline::new(TransformConfig::default())
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    let summary: Vec<(&str, &str, &str, MatchKind)> = result
        .mappings
        .iter()
        .map(|m| (m.resource_id.as_str(), m.field_path.as_str(), m.values_path.as_str(), m.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("configmap", "data.LOG_LEVEL", "logLevel", MatchKind::Exact),
            ("deployment", "spec.replicas", "replicaCount", MatchKind::Exact),
            (
                "deployment",
                "spec.template.spec.containers[0].image",
                "image.repo",
                MatchKind::Substring
            ),
            (
                "deployment",
                "spec.template.spec.containers[0].image",
                "image.tag",
                MatchKind::Substring
            ),
            ("service", "spec.ports[0].port", "service.port", MatchKind::Exact),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_schema_and_status() -> Result<()> {
    let result = Pipeline::new(TransformConfig::default())
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    let schema: Vec<(&str, &str)> =
        result.schema_fields.iter().map(|f| (f.path.as_str(), f.type_name.as_str())).collect();
    assert_eq!(
        schema,
        vec![
            ("image.repo", "string"),
            ("image.tag", "string"),
            ("logLevel", "string"),
            ("replicaCount", "integer"),
            ("service.port", "integer"),
        ]
    );
    let replicas =
        result.schema_fields.iter().find(|f| f.path == "replicaCount").expect("replicaCount");
    assert_eq!(replicas.default, json!(2));

    assert_eq!(result.status.len(), 4);
    assert_eq!(
        result.status["deployment"].ready_when,
        vec!["${self.status.availableReplicas == schema.spec.replicaCount}".to_string()]
    );
    assert_eq!(result.status["service"].projections["clusterIP"], "${self.spec.clusterIP}");
    assert!(result.status["configmap"].ready_when.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_excluded_kinds_leave_graph_and_output() -> Result<()> {
    let config = TransformConfig {
        exclude_kinds: vec!["serviceaccount".to_string()],
        ..TransformConfig::default()
    };
    let result = Pipeline::new(config).run(&web_chart(), &CancellationToken::new()).await?;

    assert!(result.resources.iter().all(|r| r.kind() != "ServiceAccount"));
    assert!(!result.graph.contains("serviceaccount"));
    assert_eq!(result.graph.dependencies_of("deployment"), vec!["configmap"]);
    assert_eq!(result.order, vec!["configmap", "deployment", "service"]);
    Ok(())
}

#[tokio::test]
async fn test_runs_are_deterministic() -> Result<()> {
    let pipeline = Pipeline::new(TransformConfig::default());
    let first = pipeline.run(&web_chart(), &CancellationToken::new()).await?;
    for _ in 0..3 {
        let again = pipeline.run(&web_chart(), &CancellationToken::new()).await?;
        assert_eq!(again.mappings, first.mappings);
        assert_eq!(again.order, first.order);
        assert_eq!(again.resources, first.resources);
        assert_eq!(again.status, first.status);
    }
    Ok(())
}
