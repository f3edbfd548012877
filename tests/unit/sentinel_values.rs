//! Sentinel markers over awkward values trees

use chartgraph::expression::interpolate;
use chartgraph::inference::sentinel::{embedded_paths, exact_marker, marker, sentinelize};
use chartgraph::utils::FieldPath;
use chartgraph::utils::field_path::get;
use serde_json::{Value, json};

fn values() -> Value {
    json!({
        "labels": {"app.kubernetes.io/name": "web"},
        "ports": [80, 443],
        "debug": false,
        "podAnnotations": {},
        "nameOverride": null
    })
}

#[test]
fn test_every_scalar_gets_its_own_marker() {
    let tagged = sentinelize(&values());

    assert_eq!(
        tagged["labels"]["app.kubernetes.io/name"],
        json!(marker(r#"labels["app.kubernetes.io/name"]"#))
    );
    assert_eq!(tagged["ports"][1], json!(marker("ports[1]")));
    assert_eq!(tagged["debug"], json!(marker("debug")));
    assert_eq!(tagged["podAnnotations"], json!({}));
    assert_eq!(tagged["nameOverride"], Value::Null);
}

#[test]
fn test_marker_paths_resolve_back_to_values() {
    let original = values();
    let tagged = sentinelize(&original);

    for leaf in [
        &tagged["labels"]["app.kubernetes.io/name"],
        &tagged["ports"][0],
        &tagged["debug"],
    ] {
        let path = exact_marker(leaf.as_str().unwrap()).unwrap();
        let parsed = FieldPath::parse(path).unwrap();
        assert!(get(&original, &parsed).is_some(), "unresolvable marker path {path}");
    }
}

#[test]
fn test_markers_inside_rendered_text() {
    let tagged = sentinelize(&values());
    let rendered = format!(
        "http://{}:{}/",
        tagged["labels"]["app.kubernetes.io/name"].as_str().unwrap(),
        tagged["ports"][0].as_str().unwrap()
    );

    assert_eq!(exact_marker(&rendered), None);
    assert_eq!(embedded_paths(&rendered), vec![r#"labels["app.kubernetes.io/name"]"#, "ports[0]"]);
    assert_eq!(
        interpolate(&rendered),
        r#"http://${schema.spec.labels["app.kubernetes.io/name"]}:${schema.spec.ports[0]}/"#
    );
}
