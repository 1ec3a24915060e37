//! Pass-2 resolution driver.
//!
//! Runs after merging, against the read-only node index. Each resolver is
//! language-scoped so new ones can be added without touching parsers. A
//! resolver failure never aborts Pass 2; unresolved targets stay placeholder
//! edges.

use serde_json::json;
use std::collections::HashMap;

use crate::analyzer::merge::NodeIndex;
use crate::analyzer::ts_resolve;
use crate::analyzer::typescript::TsProject;
use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship};

#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub relationships: Vec<Relationship>,
    /// Pass-1 placeholder edges superseded by a resolved edge.
    pub removed_edge_ids: Vec<String>,
}

pub fn resolve_all(
    index: &NodeIndex<'_>,
    pass1_edges: &[Relationship],
    project: &TsProject,
) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::default();

    outcome
        .relationships
        .extend(ts_resolve::resolve_project(project, index));
    outcome.relationships.extend(resolve_includes(index));
    outcome.relationships.extend(resolve_sql_references(index));
    upgrade_name_based_heritage(index, pass1_edges, &mut outcome);

    outcome
}

/// C/C++: `File —INCLUDES→ File`, matching the include path against the index
/// first exactly, then by suffix. Unmatched headers (system includes, files
/// outside the tree) become placeholder targets keyed by the literal path.
fn resolve_includes(index: &NodeIndex<'_>) -> Vec<Relationship> {
    let mut out = Vec::new();
    let directives: Vec<&Node> = index
        .all_files()
        .flat_map(|file| index.nodes_in_file(&file.file_path))
        .filter(|n| n.kind == NodeKind::IncludeDirective)
        .collect();
    for directive in directives {
        let Some(include_path) = directive.prop_str("includePath") else {
            continue;
        };
        let Some(source_file) = index.file_node(&directive.file_path) else {
            tracing::warn!(file = %directive.file_path, "include directive without file node");
            continue;
        };
        let target = index
            .file_node(include_path)
            .or_else(|| index.file_node_by_suffix(include_path));
        let rel = match target {
            Some(target_file) => Relationship::new(
                RelType::Includes,
                &source_file.entity_id,
                &target_file.entity_id,
            )
            .with_prop("includePath", json!(include_path))
            .with_prop("isCrossFile", json!(true)),
            None => {
                let target_id = entity_id::node_id(NodeKind::File, include_path);
                Relationship::new(RelType::Includes, &source_file.entity_id, &target_id)
                    .with_prop("includePath", json!(include_path))
                    .placeholder()
            }
        };
        out.push(rel);
    }
    out
}

/// SQL: parse stored statement text and link `REFERENCES_TABLE` /
/// `REFERENCES_VIEW` to schema objects known to the index. Name matching is
/// case-insensitive; unresolved names are simply not linked.
fn resolve_sql_references(index: &NodeIndex<'_>) -> Vec<Relationship> {
    let mut tables: HashMap<String, &Node> = HashMap::new();
    let mut views: HashMap<String, &Node> = HashMap::new();
    let mut statements: Vec<(&Node, String)> = Vec::new();

    for file in index.all_files() {
        if file.language != Language::Sql {
            continue;
        }
        for node in index.nodes_in_file(&file.file_path) {
            match node.kind {
                NodeKind::SqlTable => {
                    tables.insert(node.name.to_ascii_lowercase(), node);
                }
                NodeKind::SqlView => {
                    views.insert(node.name.to_ascii_lowercase(), node);
                    if let Some(text) = node.prop_str("queryText") {
                        statements.push((node, text.to_string()));
                    }
                }
                NodeKind::SqlSelectStatement
                | NodeKind::SqlInsertStatement
                | NodeKind::SqlUpdateStatement
                | NodeKind::SqlDeleteStatement => {
                    if let Some(text) = node.prop_str("text") {
                        statements.push((node, text.to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    let mut out = Vec::new();
    for (statement, text) in statements {
        for name in referenced_names(&text) {
            if let Some(table) = tables.get(&name) {
                if table.entity_id != statement.entity_id {
                    out.push(
                        Relationship::new(
                            RelType::ReferencesTable,
                            &statement.entity_id,
                            &table.entity_id,
                        )
                        .with_prop("tableName", json!(table.name)),
                    );
                }
            }
            if let Some(view) = views.get(&name) {
                if view.entity_id != statement.entity_id {
                    out.push(
                        Relationship::new(
                            RelType::ReferencesView,
                            &statement.entity_id,
                            &view.entity_id,
                        )
                        .with_prop("viewName", json!(view.name)),
                    );
                }
            }
        }
    }
    out
}

/// Names following FROM / JOIN / INTO / UPDATE keywords, lowercased.
pub fn referenced_names(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    let tokens: Vec<String> = sql
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();
    let mut expect_name = false;
    for token in tokens {
        let lower = token.to_ascii_lowercase();
        if expect_name {
            let cleaned: String = lower
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
                .collect();
            if !cleaned.is_empty() && !is_sql_keyword(&cleaned) {
                let bare = cleaned.rsplit('.').next().unwrap_or(&cleaned).to_string();
                if !names.contains(&bare) {
                    names.push(bare);
                }
            }
            expect_name = false;
        }
        if matches!(lower.as_str(), "from" | "join" | "into" | "update") {
            expect_name = true;
        }
    }
    names
}

fn is_sql_keyword(token: &str) -> bool {
    matches!(
        token,
        "select" | "where" | "set" | "values" | "order" | "group" | "by" | "limit" | "on"
    )
}

/// Java / C# heritage: a Pass-1 placeholder is upgraded when the index holds
/// exactly one declaration of a candidate kind with the referenced name.
fn upgrade_name_based_heritage(
    index: &NodeIndex<'_>,
    pass1_edges: &[Relationship],
    outcome: &mut ResolveOutcome,
) {
    for edge in pass1_edges {
        if !matches!(edge.rel_type, RelType::Extends | RelType::Implements) {
            continue;
        }
        if !edge.is_placeholder() {
            continue;
        }
        let Some(source) = index.get(&edge.source_id) else {
            continue;
        };
        let candidate_kinds: &[NodeKind] = match source.language {
            Language::Java => &[NodeKind::JavaClass, NodeKind::JavaInterface],
            Language::CSharp => &[
                NodeKind::CSharpClass,
                NodeKind::CSharpInterface,
                NodeKind::CSharpStruct,
            ],
            _ => continue,
        };
        let Some(target_name) = edge.properties.get("targetName").and_then(|v| v.as_str())
        else {
            continue;
        };
        let bare_name = target_name.rsplit('.').next().unwrap_or(target_name);
        let mut candidates: Vec<&Node> = Vec::new();
        for kind in candidate_kinds {
            candidates.extend(index.find_by_kind_name(*kind, bare_name));
        }
        if candidates.len() != 1 {
            continue;
        }
        let target = candidates[0];
        outcome.removed_edge_ids.push(edge.entity_id.clone());
        outcome.relationships.push(
            Relationship::new(edge.rel_type, &edge.source_id, &target.entity_id)
                .with_prop("targetName", json!(target_name))
                .with_prop(
                    "isCrossFile",
                    json!(target.file_path != source.file_path),
                ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scan_finds_from_join_into_update() {
        let names = referenced_names(
            "SELECT o.id FROM orders o JOIN customers c ON o.cid = c.id",
        );
        assert_eq!(names, vec!["orders".to_string(), "customers".to_string()]);

        assert_eq!(
            referenced_names("INSERT INTO audit_log (msg) VALUES ('x')"),
            vec!["audit_log".to_string()]
        );
        assert_eq!(
            referenced_names("UPDATE orders SET total = 0"),
            vec!["orders".to_string()]
        );
        assert_eq!(
            referenced_names("DELETE FROM orders WHERE id = 1"),
            vec!["orders".to_string()]
        );
    }

    #[test]
    fn subqueries_are_not_keywords() {
        let names = referenced_names("SELECT * FROM (SELECT * FROM inner_table) t");
        assert_eq!(names, vec!["inner_table".to_string()]);
    }
}
