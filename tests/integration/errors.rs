//! Runs that must fail, and how they fail

use anyhow::{Result, bail};
use chartgraph::config::TransformConfig;
use chartgraph::core::{ChartGraphError, Resource, user_friendly_error};
use chartgraph::inference::FieldMapping;
use chartgraph::package::{LoadedPackage, PackageLoader};
use chartgraph::pipeline::Pipeline;
use chartgraph::status::{KindRegistry, StatusFields, TransformerRegistry};
use chartgraph::test_utils::fixtures::{FakeLoader, manifest, resource};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::common::{render_web, web_chart, web_values};

fn autoscaler(name: &str, target: &str) -> Resource {
    manifest(json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "metadata": {"name": name},
        "spec": {"scaleTargetRef": {"kind": "HorizontalPodAutoscaler", "name": target}}
    }))
}

#[tokio::test]
async fn test_cycle_is_reported_with_members() {
    let loader = FakeLoader::new(
        vec![autoscaler("a", "b"), autoscaler("b", "a"), resource("ConfigMap", "c")],
        json!({}),
    );
    let err = Pipeline::new(TransformConfig::default())
        .run(&loader, &CancellationToken::new())
        .await
        .unwrap_err();

    match err.downcast_ref::<ChartGraphError>() {
        Some(ChartGraphError::CircularDependency { cycles }) => {
            assert_eq!(
                cycles,
                &vec![vec![
                    "horizontalpodautoscaler-a".to_string(),
                    "horizontalpodautoscaler-b".to_string()
                ]]
            );
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }

    let friendly = user_friendly_error(err);
    assert!(friendly.suggestion.is_some());
    assert!(
        friendly.to_string().contains("horizontalpodautoscaler-a → horizontalpodautoscaler-b")
    );
}

#[tokio::test]
async fn test_id_collision_names_both_resources() {
    let mut config = TransformConfig::default();
    config.merge_overrides([("Service/web".to_string(), "Deployment".to_string())].into());

    let err = Pipeline::new(config).run(&web_chart(), &CancellationToken::new()).await.unwrap_err();
    match err.downcast_ref::<ChartGraphError>() {
        Some(ChartGraphError::IdCollision { id, first, second }) => {
            assert_eq!(id, "deployment");
            assert_eq!(first, "Deployment/web");
            assert_eq!(second, "Service/web");
        }
        other => panic!("expected an ID collision, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_resources_rejected() {
    let loader =
        FakeLoader::new(vec![resource("ConfigMap", "a"), resource("ConfigMap", "a")], json!({}));
    let err = Pipeline::new(TransformConfig::default())
        .run(&loader, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChartGraphError>(),
        Some(ChartGraphError::DuplicateResource { key }) if key == "ConfigMap/a"
    ));
}

#[tokio::test]
async fn test_loader_failure() {
    let err = Pipeline::new(TransformConfig::default())
        .run(&FakeLoader::failing("chart 'web' not found"), &CancellationToken::new())
        .await
        .unwrap_err();
    match err.downcast_ref::<ChartGraphError>() {
        Some(ChartGraphError::LoaderError { message }) => {
            assert!(message.contains("chart 'web' not found"));
        }
        other => panic!("expected a loader error, got {other:?}"),
    }
}

/// Loads fine, but cannot render a second time.
struct SingleRender;

impl PackageLoader for SingleRender {
    fn load(&self) -> Result<LoadedPackage> {
        Ok(LoadedPackage {
            resources: render_web(&web_values()),
            values: web_values(),
            ..LoadedPackage::default()
        })
    }

    fn render_with_values(&self, _values: &Value) -> Result<Vec<Resource>> {
        bail!("renderer unavailable")
    }
}

#[tokio::test]
async fn test_sentinel_render_failure_fails_the_run() {
    let err = Pipeline::new(TransformConfig::default())
        .run(&SingleRender, &CancellationToken::new())
        .await
        .unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("sentinel"));
    assert!(chain.contains("renderer unavailable"));
}

struct CancelOnFirstCall(Arc<AtomicUsize>);

impl TransformerRegistry for CancelOnFirstCall {
    fn transform(
        &self,
        _resource: &Resource,
        _id: &str,
        _mappings: &[FieldMapping],
        cancel: &CancellationToken,
    ) -> Option<Result<StatusFields>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        cancel.cancel();
        None
    }
}

#[tokio::test]
async fn test_cancellation_between_resources() {
    let calls = Arc::new(AtomicUsize::new(0));
    let err = Pipeline::new(TransformConfig::default())
        .with_registry(Box::new(CancelOnFirstCall(Arc::clone(&calls))))
        .run(&web_chart(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<ChartGraphError>(), Some(ChartGraphError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transformer_error_propagates() {
    let registry = KindRegistry::new()
        .register("Deployment", Box::new(|_, _, _| bail!("no readiness rule")));
    let err = Pipeline::new(TransformConfig::default())
        .with_registry(Box::new(registry))
        .run(&web_chart(), &CancellationToken::new())
        .await
        .unwrap_err();

    let chain = format!("{err:#}");
    assert!(chain.contains("Deployment/web"));
    assert!(chain.contains("no readiness rule"));
}

#[tokio::test]
async fn test_registry_status_replaces_defaults() -> Result<()> {
    let registry = KindRegistry::new().register(
        "Service",
        Box::new(|_, id, _| {
            Ok(StatusFields {
                projections: [("endpoint".to_string(), format!("${{{id}.spec.clusterIP}}"))].into(),
                ready_when: vec![],
            })
        }),
    );
    let result = Pipeline::new(TransformConfig::default())
        .with_registry(Box::new(registry))
        .run(&web_chart(), &CancellationToken::new())
        .await?;

    assert_eq!(result.status["service"].projections["endpoint"], "${service.spec.clusterIP}");
    assert!(!result.status["service"].projections.contains_key("clusterIP"));
    // Other kinds still get the built-in rows
    assert!(result.status["deployment"].projections.contains_key("availableReplicas"));
    Ok(())
}
