use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};
use serde_json::json;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn import_resolution_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ts",
        "import { funcB } from './b';\nexport function funcA() { funcB(); }\n",
    );
    write(
        dir.path(),
        "b.ts",
        "export function funcB() { console.log('x'); }\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let file_a = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::File && n.name == "a.ts")
        .expect("file node for a.ts");
    let file_b = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::File && n.name == "b.ts")
        .expect("file node for b.ts");

    let import_node = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Import && n.file_path == file_a.file_path)
        .expect("Import node in a.ts");
    assert_eq!(import_node.properties["moduleSpecifier"], json!("./b"));

    let func_a = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "funcA")
        .expect("funcA node");
    let func_b = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "funcB")
        .expect("funcB node");

    // File —IMPORTS→ File, resolved inside the analyzed set.
    let file_import = result
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelType::Imports
                && r.source_id == file_a.entity_id
                && r.target_id == file_b.entity_id
        })
        .expect("a.ts IMPORTS b.ts");
    assert!(!file_import.is_placeholder());

    // Import node —RESOLVES_IMPORT→ funcB.
    assert!(
        result.relationships.iter().any(|r| {
            r.rel_type == RelType::ResolvesImport
                && r.source_id == import_node.entity_id
                && r.target_id == func_b.entity_id
        }),
        "expected RESOLVES_IMPORT to funcB"
    );

    // funcA —CALLS→ funcB, resolved and cross-file.
    let call = result
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelType::Calls
                && r.source_id == func_a.entity_id
                && r.target_id == func_b.entity_id
        })
        .expect("funcA CALLS funcB");
    assert!(!call.is_placeholder());
    assert_eq!(call.properties["isCrossFile"], json!(true));
    assert!(call.properties["callSiteLine"].as_i64().unwrap() >= 1);
}

#[test]
fn unresolved_calls_are_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ts",
        "export function run() { missingHelper(); }\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let call = result
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelType::Calls
                && r.properties.get("targetName") == Some(&json!("missingHelper"))
        })
        .expect("placeholder call edge");
    assert!(call.is_placeholder());
}

#[test]
fn inheritance_resolves_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "base.ts",
        "export class Base {}\nexport interface Marker {}\n",
    );
    write(
        dir.path(),
        "derived.ts",
        "import { Base, Marker } from './base';\nexport class Derived extends Base implements Marker {}\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let derived = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Class && n.name == "Derived")
        .unwrap();
    let base = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Class && n.name == "Base")
        .unwrap();
    let marker = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Interface && n.name == "Marker")
        .unwrap();

    let extends = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::Extends && r.source_id == derived.entity_id)
        .expect("extends edge");
    assert_eq!(extends.target_id, base.entity_id);
    assert!(!extends.is_placeholder());

    let implements = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::Implements && r.source_id == derived.entity_id)
        .expect("implements edge");
    assert_eq!(implements.target_id, marker.entity_id);
}

#[test]
fn try_catch_emits_handles_error() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ts",
        r#"
export function risky() {
    try {
        JSON.parse("{");
    } catch (err) {
        console.log(err);
    }
}
"#,
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let risky = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "risky")
        .unwrap();
    let handles = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::HandlesError)
        .expect("handles error edge");
    assert_eq!(handles.source_id, risky.entity_id);
    assert_eq!(handles.properties["catchBinding"], json!("err"));
}

#[test]
fn anonymous_catch_targets_enclosing_function() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ts",
        "export function quiet() { try { quietInner(); } catch { } }\n",
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let quiet = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "quiet")
        .unwrap();
    let handles = result
        .relationships
        .iter()
        .find(|r| r.rel_type == RelType::HandlesError)
        .expect("handles error edge");
    assert_eq!(handles.source_id, quiet.entity_id);
    assert_eq!(handles.target_id, quiet.entity_id);
}

#[test]
fn conditional_and_awaited_calls_are_flagged() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ts",
        r#"
export function helper() {}
export async function driver(flag: boolean) {
    if (flag) {
        helper();
    }
    await Promise.resolve(1);
}
"#,
    );

    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let conditional = result
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelType::Calls
                && r.properties.get("targetName") == Some(&json!("helper"))
        })
        .expect("conditional call");
    assert_eq!(conditional.properties["isConditional"], json!(true));
    assert_eq!(conditional.properties["isCrossFile"], json!(false));

    let awaited = result
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelType::Calls
                && r.properties.get("targetName") == Some(&json!("Promise.resolve"))
        })
        .expect("awaited call");
    assert_eq!(awaited.properties["isAwaited"], json!(true));
}
