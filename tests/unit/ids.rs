//! Resource IDs over a multi-workload chart

use anyhow::Result;
use chartgraph::ids::assign_resource_ids;
use chartgraph::test_utils::fixtures::resource;
use std::collections::BTreeMap;

#[test]
fn test_release_prefixed_names() -> Result<()> {
    let resources = vec![
        resource("Deployment", "release-app-api"),
        resource("Deployment", "release-app-worker"),
        resource("ConfigMap", "release-app-api-config"),
        resource("ConfigMap", "release-app-worker-config"),
        resource("Service", "release-app-api"),
    ];
    let ids = assign_resource_ids(&resources, &BTreeMap::new())?;

    let assigned: Vec<&str> = resources.iter().filter_map(|r| ids.get(r)).collect();
    assert_eq!(
        assigned,
        vec![
            "deployment-api",
            "deployment-worker",
            "configmap-api-config",
            "configmap-worker-config",
            "service",
        ]
    );
    assert_eq!(ids.get_by_key("Deployment/release-app-api"), Some("deployment-api"));
    assert!(
        assigned
            .iter()
            .all(|id| id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'))
    );
    Ok(())
}

#[test]
fn test_override_frees_the_kind_name() -> Result<()> {
    let resources =
        vec![resource("Deployment", "release-api"), resource("Deployment", "release-worker")];
    let overrides = BTreeMap::from([(
        "Deployment/release-worker".to_string(),
        "Background_Jobs".to_string(),
    )]);
    let ids = assign_resource_ids(&resources, &overrides)?;

    // The remaining deployment is alone in its group again
    assert_eq!(ids.get(&resources[0]), Some("deployment"));
    assert_eq!(ids.get(&resources[1]), Some("background-jobs"));
    Ok(())
}
