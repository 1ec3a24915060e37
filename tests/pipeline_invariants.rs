//! Whole-pipeline invariants over a mixed-language tree.

use cartograph::analyzer::{run_extraction, AnalyzeOptions};
use cartograph::model::{NodeKind, RelType};
use std::collections::{HashMap, HashSet};

fn write(dir: &std::path::Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn mixed_tree(dir: &std::path::Path) {
    write(
        dir,
        "a.ts",
        "import { helper } from './b';\nexport function main() { helper(); unknownFn(); }\n",
    );
    write(dir, "b.ts", "export function helper() {}\n");
    write(
        dir,
        "Calculator.java",
        "package com.example;\npublic class Calculator { public int add(int a, int b) { return a + b; } }\n",
    );
    write(dir, "main.c", "#include \"missing.h\"\nint main() { return 0; }\n");
    write(dir, "schema.sql", "CREATE TABLE orders (id INTEGER);\n");
}

#[test]
fn merged_nodes_have_unique_entity_ids() {
    let dir = tempfile::tempdir().unwrap();
    mixed_tree(dir.path());
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let mut seen = HashSet::new();
    for node in &result.nodes {
        assert!(
            seen.insert(&node.entity_id),
            "duplicate entity id {}",
            node.entity_id
        );
    }
    let mut rel_seen = HashSet::new();
    for rel in &result.relationships {
        assert!(
            rel_seen.insert(&rel.entity_id),
            "duplicate relationship id {}",
            rel.entity_id
        );
    }
}

#[test]
fn unresolved_targets_are_marked_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    mixed_tree(dir.path());
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let node_ids: HashSet<&str> = result.nodes.iter().map(|n| n.entity_id.as_str()).collect();
    for rel in &result.relationships {
        let checked = matches!(
            rel.rel_type,
            RelType::Calls
                | RelType::Imports
                | RelType::Includes
                | RelType::Extends
                | RelType::Implements
        );
        if checked && !node_ids.contains(rel.target_id.as_str()) {
            assert!(
                rel.is_placeholder(),
                "{} edge to unknown target {} not marked placeholder",
                rel.rel_type.label(),
                rel.target_id
            );
        }
    }
}

#[test]
fn containment_edges_have_container_sources() {
    let dir = tempfile::tempdir().unwrap();
    mixed_tree(dir.path());
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let by_id: HashMap<&str, &cartograph::model::Node> = result
        .nodes
        .iter()
        .map(|n| (n.entity_id.as_str(), n))
        .collect();
    for rel in &result.relationships {
        let allowed: &[NodeKind] = match rel.rel_type {
            RelType::HasMethod => &[
                NodeKind::Class,
                NodeKind::Interface,
                NodeKind::CppClass,
                NodeKind::JavaClass,
                NodeKind::JavaInterface,
                NodeKind::CSharpClass,
                NodeKind::CSharpInterface,
                NodeKind::CSharpStruct,
                NodeKind::GoStruct,
                NodeKind::PythonClass,
            ],
            RelType::HasParameter => &[
                NodeKind::Function,
                NodeKind::Method,
                NodeKind::CFunction,
                NodeKind::CppMethod,
                NodeKind::JavaMethod,
                NodeKind::CSharpMethod,
                NodeKind::GoFunction,
                NodeKind::GoMethod,
                NodeKind::PythonFunction,
                NodeKind::PythonMethod,
            ],
            RelType::HasColumn => &[NodeKind::SqlTable],
            _ => continue,
        };
        if let Some(source) = by_id.get(rel.source_id.as_str()) {
            assert!(
                allowed.contains(&source.kind),
                "{} edge from {:?}",
                rel.rel_type.label(),
                source.kind
            );
        }
    }
}

#[test]
fn all_kinds_come_from_the_closed_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    mixed_tree(dir.path());
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    for node in &result.nodes {
        assert!(NodeKind::from_label(node.kind.label()).is_some());
    }
    for rel in &result.relationships {
        assert!(RelType::from_label(rel.rel_type.label()).is_some());
    }
}

#[test]
fn empty_directory_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    assert_eq!(result.scanned, 0);
    assert!(result.nodes.is_empty());
    assert!(result.relationships.is_empty());
}

#[test]
fn file_with_no_constructs_still_gets_a_file_node() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "empty.ts", "// nothing here\n");
    let result = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.nodes[0].kind, NodeKind::File);
}

#[test]
fn ignored_and_unsupported_files_never_appear() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "keep.ts", "export const x = 1;\n");
    write(dir.path(), "node_modules/dep/index.ts", "export const y = 2;\n");
    write(dir.path(), "notes.rb", "puts 'nope'\n");
    write(dir.path(), "generated/skipme.ts", "export const z = 3;\n");

    let options = AnalyzeOptions {
        ignore: vec!["**/generated/**".to_string()],
        ..AnalyzeOptions::default()
    };
    let result = run_extraction(dir.path(), &options).unwrap();
    assert_eq!(result.scanned, 1);
    assert!(result.nodes.iter().all(|n| !n.file_path.contains("node_modules")));
    assert!(result.nodes.iter().all(|n| !n.file_path.contains("generated")));
    assert!(result.nodes.iter().all(|n| !n.file_path.ends_with(".rb")));
}

#[test]
fn extension_override_narrows_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.ts", "export const x = 1;\n");
    write(dir.path(), "b.py", "x = 1\n");

    let options = AnalyzeOptions {
        extensions: Some(".ts".to_string()),
        ..AnalyzeOptions::default()
    };
    let result = run_extraction(dir.path(), &options).unwrap();
    assert_eq!(result.scanned, 1);
    assert!(result.nodes.iter().all(|n| n.file_path.ends_with(".ts")));
}

#[test]
fn repeated_extraction_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    mixed_tree(dir.path());

    let first = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();
    let second = run_extraction(dir.path(), &AnalyzeOptions::default()).unwrap();

    let mut first_nodes: Vec<&String> = first.nodes.iter().map(|n| &n.entity_id).collect();
    let mut second_nodes: Vec<&String> = second.nodes.iter().map(|n| &n.entity_id).collect();
    first_nodes.sort();
    second_nodes.sort();
    assert_eq!(first_nodes, second_nodes);

    let mut first_rels: Vec<&String> =
        first.relationships.iter().map(|r| &r.entity_id).collect();
    let mut second_rels: Vec<&String> =
        second.relationships.iter().map(|r| &r.entity_id).collect();
    first_rels.sort();
    second_rels.sort();
    assert_eq!(first_rels, second_rels);
}
