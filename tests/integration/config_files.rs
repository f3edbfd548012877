//! Configuration and override files driving a run

use anyhow::Result;
use chartgraph::config::{StrategyKind, TieBreak, TransformConfig, load_overrides};
use chartgraph::core::ChartGraphError;
use chartgraph::pipeline::Pipeline;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::web_chart;

#[tokio::test]
async fn test_config_and_overrides_from_disk() -> Result<()> {
    chartgraph::test_utils::init_test_logging(None);
    let temp = TempDir::new()?;

    let config_path = temp.path().join("chartgraph.toml");
    std::fs::write(
        &config_path,
        r#"
strategy = "fast"
tie_break = "most-specific"
exclude_kinds = ["ServiceAccount"]

[concurrency]
enabled = false

[id_overrides]
"Deployment/web" = "frontend"
"#,
    )?;
    let overrides_path = temp.path().join("ids.yaml");
    std::fs::write(&overrides_path, "Service/web: Web Service\n")?;

    let mut config = TransformConfig::load(&config_path)?;
    assert_eq!(config.strategy, StrategyKind::Fast);
    assert_eq!(config.tie_break, TieBreak::MostSpecific);
    config.merge_overrides(load_overrides(&overrides_path)?);

    let result = Pipeline::new(config).run(&web_chart(), &CancellationToken::new()).await?;
    assert_eq!(result.order, vec!["configmap", "frontend", "web-service"]);
    assert!(result.mappings.iter().any(|m| m.resource_id == "frontend"));
    assert_eq!(
        result.status["frontend"].ready_when,
        vec!["${self.status.availableReplicas == schema.spec.replicaCount}".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_unused_override_is_a_warning() -> Result<()> {
    let mut config = TransformConfig::default();
    config.merge_overrides([("Secret/absent".to_string(), "secret".to_string())].into());

    let result = Pipeline::new(config).run(&web_chart(), &CancellationToken::new()).await?;
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("Secret/absent"));
    Ok(())
}

#[test]
fn test_json_overrides() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("ids.json");
    std::fs::write(&path, r#"{"ConfigMap/web-config": "settings"}"#)?;
    let overrides = load_overrides(&path)?;
    assert_eq!(overrides["ConfigMap/web-config"], "settings");
    Ok(())
}

#[test]
fn test_malformed_override_key_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("ids.yaml");
    std::fs::write(&path, "web: frontend\n")?;

    let err = load_overrides(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChartGraphError>(),
        Some(ChartGraphError::ConfigError { .. })
    ));
    Ok(())
}

#[test]
fn test_unknown_config_field_rejected() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("chartgraph.toml");
    std::fs::write(&path, "strategy = \"sentinel\"\nworkers = 4\n")?;

    let err = TransformConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("workers"));
    Ok(())
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    let err = TransformConfig::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChartGraphError>(),
        Some(ChartGraphError::FileSystemError { .. })
    ));
}
