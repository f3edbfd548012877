//! Inference strategies as seen through the pipeline

use anyhow::Result;
use chartgraph::config::{ConcurrencyConfig, StrategyKind, TransformConfig};
use chartgraph::inference::{FieldMapping, InferenceContext, InferenceOutcome, InferenceStrategy};
use chartgraph::pipeline::Pipeline;
use chartgraph::schema::{SchemaExtractor, SchemaField};
use chartgraph::test_utils::fixtures::FakeLoader;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::common::{render_web, web_chart, web_values};

fn fast() -> TransformConfig {
    TransformConfig {
        strategy: StrategyKind::Fast,
        ..TransformConfig::default()
    }
}

#[tokio::test]
async fn test_fast_and_sentinel_agree_on_web_chart() -> Result<()> {
    chartgraph::test_utils::init_test_logging(None);
    let cancel = CancellationToken::new();

    let sentinel = Pipeline::new(TransformConfig::default()).run(&web_chart(), &cancel).await?;
    let fast = Pipeline::new(fast()).run(&web_chart(), &cancel).await?;

    assert_eq!(fast.mappings, sentinel.mappings);
    assert_eq!(fast.resources, sentinel.resources);
    assert_eq!(fast.order, sentinel.order);
    assert!(fast.warnings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_fast_schema_follows_template_references() -> Result<()> {
    let result = Pipeline::new(fast()).run(&web_chart(), &CancellationToken::new()).await?;

    let paths: Vec<&str> = result.schema_fields.iter().map(|f| f.path.as_str()).collect();
    // `with .Values.image` references the whole object as well
    assert_eq!(
        paths,
        vec!["image", "image.repo", "image.tag", "logLevel", "replicaCount", "service.port"]
    );
    Ok(())
}

#[tokio::test]
async fn test_fast_skips_broken_templates_with_warning() -> Result<()> {
    let loader = web_chart().with_template("broken.yaml", "replicas: {{ .Values.replicaCount");
    let result = Pipeline::new(fast()).run(&loader, &CancellationToken::new()).await?;

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("broken.yaml"));
    // The other templates still reference replicaCount
    assert!(result.mappings.iter().any(|m| m.values_path == "replicaCount"));
    Ok(())
}

#[tokio::test]
async fn test_fast_ignores_unreferenced_values() -> Result<()> {
    let mut values = web_values();
    values["unused"] = json!("nginx");
    let loader = FakeLoader::rendering(values, render_web).with_template(
        "deployment.yaml",
        "image: {{ .Values.image.repo }}:{{ .Values.image.tag }}",
    );
    let result = Pipeline::new(fast()).run(&loader, &CancellationToken::new()).await?;

    let paths: BTreeSet<&str> = result.mappings.iter().map(|m| m.values_path.as_str()).collect();
    assert_eq!(paths, BTreeSet::from(["image.repo", "image.tag"]));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_diff_matches_sequential() -> Result<()> {
    let concurrent = TransformConfig {
        concurrency: ConcurrencyConfig {
            enabled: true,
            workers: Some(2),
            threshold: 1,
        },
        ..TransformConfig::default()
    };
    let sequential = TransformConfig {
        concurrency: ConcurrencyConfig::sequential(),
        ..TransformConfig::default()
    };

    let cancel = CancellationToken::new();
    let a = Pipeline::new(concurrent).run(&web_chart(), &cancel).await?;
    let b = Pipeline::new(sequential).run(&web_chart(), &cancel).await?;
    assert_eq!(a.mappings, b.mappings);
    assert_eq!(a.resources, b.resources);
    Ok(())
}

#[tokio::test]
async fn test_sentinel_without_rerender_finds_nothing() -> Result<()> {
    let loader = FakeLoader::new(render_web(&web_values()), web_values());
    let result =
        Pipeline::new(TransformConfig::default()).run(&loader, &CancellationToken::new()).await?;

    assert!(result.mappings.is_empty());
    assert_eq!(result.resources, render_web(&web_values()));
    assert_eq!(result.schema_fields.len(), 5);
    assert_eq!(result.order.len(), 4);
    Ok(())
}

struct OnlyReplicas;

impl SchemaExtractor for OnlyReplicas {
    fn extract(
        &self,
        values: &Value,
        _referenced: Option<&BTreeSet<String>>,
    ) -> Result<Vec<SchemaField>> {
        Ok(vec![SchemaField {
            path: "replicaCount".to_string(),
            type_name: "integer".to_string(),
            default: values["replicaCount"].clone(),
        }])
    }
}

#[tokio::test]
async fn test_prune_drops_mappings_outside_schema() -> Result<()> {
    let config = TransformConfig {
        prune_schema: true,
        ..TransformConfig::default()
    };
    let result = Pipeline::new(config)
        .with_schema_extractor(Box::new(OnlyReplicas))
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    assert_eq!(result.mappings.len(), 1);
    assert_eq!(result.mappings[0].values_path, "replicaCount");

    let deployment =
        result.resources.iter().find(|r| r.kind() == "Deployment").expect("deployment");
    assert_eq!(
        deployment.object["spec"]["template"]["spec"]["containers"][0]["image"],
        json!("nginx:1.25")
    );
    Ok(())
}

#[tokio::test]
async fn test_without_prune_keeps_uncovered_mappings() -> Result<()> {
    let result = Pipeline::new(TransformConfig::default())
        .with_schema_extractor(Box::new(OnlyReplicas))
        .run(&web_chart(), &CancellationToken::new())
        .await?;
    assert_eq!(result.mappings.len(), 5);
    assert_eq!(result.schema_fields.len(), 1);
    Ok(())
}

struct Fixed(Vec<FieldMapping>);

impl InferenceStrategy for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn infer<'a>(
        &'a self,
        _ctx: &'a InferenceContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<InferenceOutcome>> + Send + 'a>> {
        Box::pin(async move {
            Ok(InferenceOutcome {
                mappings: self.0.clone(),
                referenced_paths: None,
                warnings: vec!["fixed mappings".to_string()],
            })
        })
    }
}

#[tokio::test]
async fn test_custom_strategy_is_used() -> Result<()> {
    let strategy = Fixed(vec![FieldMapping::exact("logLevel", "configmap", "data.LOG_LEVEL")]);
    let result = Pipeline::new(TransformConfig::default())
        .with_strategy(Box::new(strategy))
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    assert_eq!(result.mappings.len(), 1);
    assert_eq!(result.warnings, vec!["fixed mappings".to_string()]);
    let configmap = result.resources.iter().find(|r| r.kind() == "ConfigMap").expect("configmap");
    assert_eq!(configmap.object["data"]["LOG_LEVEL"], json!("${schema.spec.logLevel}"));
    Ok(())
}
