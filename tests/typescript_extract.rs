use cartograph::analyzer::typescript::TsProject;
use cartograph::model::{Language, NodeKind, RelType};
use serde_json::json;

fn extract(source: &str) -> cartograph::model::SingleFileParseResult {
    let mut project = TsProject::new().unwrap();
    project
        .add_file("/src/types.ts", Language::TypeScript, source.to_string())
        .unwrap();
    let file = project.get("/src/types.ts").unwrap();
    project.extract(file).unwrap()
}

#[test]
fn extracts_declarations_and_containment() {
    let source = r#"
import type { Foo } from "./foo";

export interface Greeter {
    greet(name: string): void;
    label: string;
}

export type Id = string | number;

export enum Kind { A, B }

export class Impl implements Greeter {
    label: string = "impl";
    private helper(): void {}
    async greet(name: string) { this.helper(); }
}

export const LIMIT = 10;
let counter = 0;
"#;
    let result = extract(source);

    let kinds: Vec<(NodeKind, &str)> = result
        .nodes
        .iter()
        .map(|n| (n.kind, n.name.as_str()))
        .collect();

    assert!(kinds.contains(&(NodeKind::File, "types.ts")));
    assert!(kinds.contains(&(NodeKind::Import, "./foo")));
    assert!(kinds.contains(&(NodeKind::Interface, "Greeter")));
    assert!(kinds.contains(&(NodeKind::TypeAlias, "Id")));
    assert!(kinds.contains(&(NodeKind::TypeAlias, "Kind")));
    assert!(kinds.contains(&(NodeKind::Class, "Impl")));
    assert!(kinds.contains(&(NodeKind::Method, "greet")));
    assert!(kinds.contains(&(NodeKind::Method, "helper")));
    assert!(kinds.contains(&(NodeKind::Variable, "LIMIT")));
    assert!(kinds.contains(&(NodeKind::Variable, "counter")));

    let import = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Import)
        .unwrap();
    assert_eq!(import.properties["isTypeOnly"], json!(true));

    let enum_node = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::TypeAlias && n.name == "Kind")
        .unwrap();
    assert_eq!(enum_node.properties["isEnum"], json!(true));

    let limit = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Variable && n.name == "LIMIT")
        .unwrap();
    assert_eq!(limit.properties["isConstant"], json!(true));
    assert_eq!(limit.properties["isExported"], json!(true));
    let counter = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Variable && n.name == "counter")
        .unwrap();
    assert_eq!(counter.properties["isConstant"], json!(false));

    // Interface method signatures are flagged.
    let greet_sig = result
        .nodes
        .iter()
        .find(|n| {
            n.kind == NodeKind::Method
                && n.name == "greet"
                && n.properties.get("isSignature") == Some(&json!(true))
        })
        .expect("interface method signature");
    assert!(greet_sig.parent_id.is_some());

    // The class implementation method is not a signature and is async.
    let greet_impl = result
        .nodes
        .iter()
        .find(|n| {
            n.kind == NodeKind::Method
                && n.name == "greet"
                && n.properties.get("isSignature") == Some(&json!(false))
        })
        .expect("class method");
    assert_eq!(greet_impl.properties["isAsync"], json!(true));
    let helper = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Method && n.name == "helper")
        .unwrap();
    assert_eq!(helper.properties["visibility"], json!("private"));

    let class_node = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Class)
        .unwrap();
    assert_eq!(
        class_node.properties["implementsNames"],
        json!(["Greeter"])
    );

    let edge_types: Vec<RelType> = result.relationships.iter().map(|r| r.rel_type).collect();
    assert!(edge_types.contains(&RelType::Imports));
    assert!(edge_types.contains(&RelType::HasMethod));
    assert!(edge_types.contains(&RelType::HasProperty));
    assert!(edge_types.contains(&RelType::HasParameter));
    assert!(edge_types.contains(&RelType::DefinesClass));
    assert!(edge_types.contains(&RelType::DefinesInterface));
    assert!(edge_types.contains(&RelType::Exports));
}

#[test]
fn named_imports_record_their_bindings() {
    let source = "import def, { one, two as alias } from './mod';\nimport * as ns from './ns';\n";
    let result = extract(source);
    let imports: Vec<&cartograph::model::Node> = result
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Import)
        .collect();
    assert_eq!(imports.len(), 2);

    let first = imports.iter().find(|n| n.name == "./mod").unwrap();
    assert_eq!(first.properties["defaultImport"], json!("def"));
    let named = first.properties["namedImports"].as_array().unwrap();
    assert_eq!(named.len(), 2);
    assert_eq!(named[1]["name"], json!("two"));
    assert_eq!(named[1]["alias"], json!("alias"));

    let second = imports.iter().find(|n| n.name == "./ns").unwrap();
    assert_eq!(second.properties["namespaceImport"], json!("ns"));
}

#[test]
fn jsdoc_is_attached_to_functions() {
    let source = r#"
/**
 * Adds two numbers.
 * @param a left operand
 * @returns the sum
 */
export function add(a: number, b: number): number {
    return a + b;
}
"#;
    let result = extract(source);
    let add = result
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Function && n.name == "add")
        .unwrap();
    assert_eq!(add.properties["documentation"], json!("Adds two numbers."));
    let tags = add.properties["jsdocTags"].as_array().unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(add.properties["returnType"], json!("number"));
}

#[test]
fn ids_are_stable_across_extractions() {
    let source = "export function stable() {}\nexport class Fixed { member() {} }\n";
    let first = extract(source);
    let second = extract(source);
    let mut first_ids: Vec<&String> = first.nodes.iter().map(|n| &n.entity_id).collect();
    let mut second_ids: Vec<&String> = second.nodes.iter().map(|n| &n.entity_id).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);

    let mut first_rels: Vec<&String> =
        first.relationships.iter().map(|r| &r.entity_id).collect();
    let mut second_rels: Vec<&String> =
        second.relationships.iter().map(|r| &r.entity_id).collect();
    first_rels.sort();
    second_rels.sort();
    assert_eq!(first_rels, second_rels);
}
