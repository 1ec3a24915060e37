use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn java_extends_upgrades_when_base_is_in_the_index() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Base.java",
        "package com.example;\n\npublic class Base {}\n",
    );
    write(
        dir.path(),
        "Derived.java",
        "package com.example;\n\npublic class Derived extends Base {}\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let base = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::JavaClass && n.name == "Base")
        .unwrap();
    let derived = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::JavaClass && n.name == "Derived")
        .unwrap();

    let extends: Vec<&cartograph::model::Relationship> = result
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelType::Extends && r.source_id == derived.entity_id)
        .collect();
    assert_eq!(extends.len(), 1, "placeholder replaced, not duplicated");
    assert_eq!(extends[0].target_id, base.entity_id);
    assert!(!extends[0].is_placeholder());
}

#[test]
fn unknown_bases_remain_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Solo.java",
        "public class Solo extends SomethingExternal {}\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let extends = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::Extends)
        .expect("extends edge");
    assert!(extends.is_placeholder());
}

#[test]
fn csharp_base_list_upgrades_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Shape.cs",
        "namespace Geo { public class Shape {} }\n",
    );
    write(
        dir.path(),
        "Circle.cs",
        "namespace Geo { public class Circle : Shape {} }\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let shape = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::CSharpClass && n.name == "Shape")
        .unwrap();
    let circle = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::CSharpClass && n.name == "Circle")
        .unwrap();
    let extends = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::Extends && r.source_id == circle.entity_id)
        .expect("extends edge");
    assert_eq!(extends.target_id, shape.entity_id);
    assert!(!extends.is_placeholder());
}
