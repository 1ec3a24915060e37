//! SQL extraction (Pass 1).
//!
//! DDL (`CREATE TABLE` / `CREATE VIEW`) produces schema nodes; DML statements
//! become statement nodes carrying their full text, which the Pass-2 resolver
//! scans for table and view references.

use anyhow::{anyhow, Result};
use serde_json::json;
use tree_sitter::{Node as TsNode, Parser};

use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship, SingleFileParseResult};
use crate::util::{self, node_text, span_of};

pub struct SqlParser {
    parser: Parser,
}

struct Ctx {
    file_path: String,
    file_id: String,
}

impl SqlParser {
    pub fn new() -> Result<SqlParser> {
        let mut parser = Parser::new();
        let language = tree_sitter_sequel::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(SqlParser { parser })
    }

    pub fn parse(&mut self, norm_path: &str, source: &str) -> Result<SingleFileParseResult> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("tree-sitter returned no tree for {norm_path}"))?;
        let root = tree.root_node();

        let mut out = SingleFileParseResult::new(norm_path);
        let file_node = Node::new(
            NodeKind::File,
            util::file_basename(norm_path),
            norm_path,
            norm_path,
            Language::Sql,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);

        let ctx = Ctx {
            file_path: norm_path.to_string(),
            file_id,
        };
        walk_node(root, &ctx, source, &mut out);
        Ok(out)
    }
}

fn walk_node(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    match node.kind() {
        "create_table" => {
            handle_create_table(node, ctx, source, out);
            return;
        }
        "create_view" | "create_materialized_view" => {
            handle_create_view(node, ctx, source, out);
            return;
        }
        _ => {}
    }
    if let Some(kind) = dml_statement_kind(node, source) {
        handle_dml(node, ctx, source, out, kind);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk_node(child, ctx, source, out);
    }
}

fn handle_create_table(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name) = object_name(node, source) else {
        tracing::debug!(file = %ctx.file_path, "CREATE TABLE without a name, skipping");
        return;
    };
    let qualified = entity_id::type_qualified(&ctx.file_path, &name);
    let table = Node::new(
        NodeKind::SqlTable,
        name,
        &qualified,
        &ctx.file_path,
        Language::Sql,
        span_of(node),
    )
    .with_parent(&ctx.file_id);
    let table_id = table.entity_id.clone();
    out.nodes.push(table);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &table_id));
    out.relationships.push(Relationship::new(
        RelType::DefinesTable,
        &ctx.file_id,
        &table_id,
    ));

    let mut columns = Vec::new();
    collect_column_definitions(node, &mut columns);
    for column in columns {
        let Some(column_name) = column_name(column, source) else {
            continue;
        };
        let column_qualified = entity_id::method_qualified(&qualified, &column_name);
        let column_node = Node::new(
            NodeKind::SqlColumn,
            column_name,
            &column_qualified,
            &ctx.file_path,
            Language::Sql,
            span_of(column),
        )
        .with_parent(&table_id)
        .with_prop("definition", json!(node_text(column, source)));
        let column_id = column_node.entity_id.clone();
        out.nodes.push(column_node);
        out.relationships
            .push(Relationship::new(RelType::HasColumn, &table_id, &column_id));
    }
}

fn handle_create_view(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name) = object_name(node, source) else {
        tracing::debug!(file = %ctx.file_path, "CREATE VIEW without a name, skipping");
        return;
    };
    let qualified = entity_id::type_qualified(&ctx.file_path, &name);
    let view = Node::new(
        NodeKind::SqlView,
        name,
        &qualified,
        &ctx.file_path,
        Language::Sql,
        span_of(node),
    )
    .with_parent(&ctx.file_id)
    .with_prop("queryText", json!(node_text(node, source)));
    let view_id = view.entity_id.clone();
    out.nodes.push(view);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &view_id));
    out.relationships.push(Relationship::new(
        RelType::DefinesView,
        &ctx.file_id,
        &view_id,
    ));
}

fn handle_dml(
    node: TsNode<'_>,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    kind: NodeKind,
) {
    let span = span_of(node);
    let verb = match kind {
        NodeKind::SqlSelectStatement => "select",
        NodeKind::SqlInsertStatement => "insert",
        NodeKind::SqlUpdateStatement => "update",
        _ => "delete",
    };
    let qualified = entity_id::function_qualified(&ctx.file_path, verb, span.start_line);
    let statement = Node::new(
        kind,
        verb,
        &qualified,
        &ctx.file_path,
        Language::Sql,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("text", json!(node_text(node, source)));
    let statement_id = statement.entity_id.clone();
    out.nodes.push(statement);
    out.relationships.push(Relationship::new(
        RelType::Contains,
        &ctx.file_id,
        &statement_id,
    ));
}

/// Statement-level DML detection by leading keyword; grammar statement kinds
/// vary between dialect grammars, the text prefix does not.
fn dml_statement_kind(node: TsNode<'_>, source: &str) -> Option<NodeKind> {
    if node.kind() != "statement" {
        return None;
    }
    let text = node_text(node, source);
    let first = text.split_whitespace().next()?.to_ascii_lowercase();
    match first.as_str() {
        "select" => Some(NodeKind::SqlSelectStatement),
        "insert" => Some(NodeKind::SqlInsertStatement),
        "update" => Some(NodeKind::SqlUpdateStatement),
        "delete" => Some(NodeKind::SqlDeleteStatement),
        _ => None,
    }
}

fn object_name(node: TsNode<'_>, source: &str) -> Option<String> {
    let reference = find_kind(node, "object_reference")?;
    let name_node = reference.child_by_field_name("name")?;
    let name = node_text(name_node, source);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn find_kind<'t>(node: TsNode<'t>, kind: &str) -> Option<TsNode<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = find_kind(child, kind) {
            return Some(found);
        }
    }
    None
}

fn collect_column_definitions<'t>(node: TsNode<'t>, out: &mut Vec<TsNode<'t>>) {
    if node.kind() == "column_definition" {
        out.push(node);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_column_definitions(child, out);
    }
}

fn column_name(column: TsNode<'_>, source: &str) -> Option<String> {
    if let Some(name_node) = column.child_by_field_name("name") {
        let name = node_text(name_node, source);
        if !name.is_empty() {
            return Some(name);
        }
    }
    let mut cursor = column.walk();
    for child in column.named_children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "column") {
            let name = node_text(child, source);
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_with_columns() {
        let source = r#"
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_name TEXT,
    total NUMERIC
);
"#;
        let mut parser = SqlParser::new().unwrap();
        let result = parser.parse("/db/schema.sql", source).unwrap();

        let table = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::SqlTable)
            .expect("table node");
        assert_eq!(table.name, "orders");

        let columns: Vec<&Node> = result
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::SqlColumn)
            .collect();
        assert_eq!(columns.len(), 3);
        assert!(columns.iter().any(|c| c.name == "customer_name"));
        assert_eq!(
            result
                .relationships
                .iter()
                .filter(|r| r.rel_type == RelType::HasColumn)
                .count(),
            3
        );
        assert!(result
            .relationships
            .iter()
            .any(|r| r.rel_type == RelType::DefinesTable));
    }

    #[test]
    fn create_view_stores_query_text() {
        let source = "CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100;\n";
        let mut parser = SqlParser::new().unwrap();
        let result = parser.parse("/db/views.sql", source).unwrap();
        let view = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::SqlView)
            .expect("view node");
        assert_eq!(view.name, "big_orders");
        let text = view.properties["queryText"].as_str().unwrap();
        assert!(text.to_ascii_lowercase().contains("from orders"));
    }

    #[test]
    fn dml_statements_keep_their_text() {
        let source = "SELECT id FROM orders;\nDELETE FROM orders WHERE id = 1;\n";
        let mut parser = SqlParser::new().unwrap();
        let result = parser.parse("/db/queries.sql", source).unwrap();
        assert!(result
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::SqlSelectStatement));
        assert!(result
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::SqlDeleteStatement));
    }
}
