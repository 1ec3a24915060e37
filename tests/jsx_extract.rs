use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};
use serde_json::json;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn component_usage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app.tsx",
        r#"
function Parent() {
    return <Child prop="x" />;
}

function Child(props) {
    return <div />;
}
"#,
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let components: Vec<&cartograph::model::Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Component)
        .collect();
    assert_eq!(components.len(), 2, "Parent and Child components");
    let parent = components.iter().find(|n| n.name == "Parent").unwrap();
    let child = components.iter().find(|n| n.name == "Child").unwrap();

    let child_element = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::JsxElement && n.name == "Child")
        .expect("<Child> element");
    let div_element = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::JsxElement && n.name == "div")
        .expect("<div> element");

    // Parent renders <Child>; Child renders <div>.
    assert!(result.relationships.iter().any(|r| {
        r.rel_type == RelType::RendersElement
            && r.source_id == parent.entity_id
            && r.target_id == child_element.entity_id
    }));
    assert!(result.relationships.iter().any(|r| {
        r.rel_type == RelType::RendersElement
            && r.source_id == child.entity_id
            && r.target_id == div_element.entity_id
    }));

    // USES_COMPONENT Parent -> Child.
    let usage = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::UsesComponent)
        .expect("USES_COMPONENT edge");
    assert_eq!(usage.source_id, parent.entity_id);
    assert_eq!(usage.target_id, child.entity_id);
    assert!(!usage.is_placeholder());

    // The prop on <Child>.
    let attr = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::JsxAttribute && n.name == "prop")
        .expect("JSXAttribute node");
    assert_eq!(attr.properties["value"], json!("x"));
    assert!(result.relationships.iter().any(|r| {
        r.rel_type == RelType::HasProp
            && r.source_id == child_element.entity_id
            && r.target_id == attr.entity_id
    }));
}

#[test]
fn class_names_become_tailwind_nodes() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "card.tsx",
        r#"
export function Card() {
    return <div className="flex items-center p-4">card</div>;
}
"#,
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let tailwind: Vec<&cartograph::model::Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::TailwindClass)
        .collect();
    let mut names: Vec<&str> = tailwind.iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["flex", "items-center", "p-4"]);
    assert_eq!(
        result
            .relationships
            .iter()
            .filter(|r| r.rel_type == RelType::UsesTailwindClass)
            .count(),
        3
    );
}

#[test]
fn imported_components_resolve_cross_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "button.tsx",
        "export function Button() { return <button />; }\n",
    );
    write(
        dir.path(),
        "page.tsx",
        "import { Button } from './button';\nexport function Page() { return <Button />; }\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let page = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Component && n.name == "Page")
        .unwrap();
    let button = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Component && n.name == "Button")
        .unwrap();
    let usage = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::UsesComponent && r.source_id == page.entity_id)
        .expect("cross-file USES_COMPONENT");
    assert_eq!(usage.target_id, button.entity_id);
    assert_eq!(usage.properties["isCrossFile"], json!(true));
}
