//! Go extraction (Pass 1).

use anyhow::{anyhow, Result};
use serde_json::json;
use tree_sitter::{Node as TsNode, Parser};

use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship, SingleFileParseResult};
use crate::util::{self, node_text, span_of, unquote};

pub struct GoParser {
    parser: Parser,
}

struct Ctx {
    file_path: String,
    file_id: String,
    package: Option<String>,
}

impl GoParser {
    pub fn new() -> Result<GoParser> {
        let mut parser = Parser::new();
        let language = tree_sitter_go::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(GoParser { parser })
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
            Language::Go,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);

        let mut ctx = Ctx {
            file_path: norm_path.to_string(),
            file_id,
            package: None,
        };
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            walk_node(child, &mut ctx, source, &mut out);
        }
        Ok(out)
    }
}

fn walk_node(node: TsNode<'_>, ctx: &mut Ctx, source: &str, out: &mut SingleFileParseResult) {
    match node.kind() {
        "package_clause" => handle_package(node, ctx, source, out),
        "import_declaration" => handle_import(node, ctx, source, out),
        "function_declaration" => handle_function(node, ctx, source, out),
        "method_declaration" => handle_method(node, ctx, source, out),
        "type_declaration" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "type_spec" {
                    handle_type_spec(child, ctx, source, out);
                }
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_node(child, ctx, source, out);
            }
        }
    }
}

fn handle_package(node: TsNode<'_>, ctx: &mut Ctx, source: &str, out: &mut SingleFileParseResult) {
    let mut name = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "package_identifier" {
            name = node_text(child, source);
            break;
        }
    }
    if name.is_empty() {
        return;
    }
    ctx.package = Some(name.clone());
    let clause = Node::new(
        NodeKind::PackageClause,
        name.clone(),
        &name,
        &ctx.file_path,
        Language::Go,
        span_of(node),
    )
    .with_parent(&ctx.file_id);
    let clause_id = clause.entity_id.clone();
    out.nodes.push(clause);
    out.relationships.push(Relationship::new(
        RelType::DeclaresPackage,
        &ctx.file_id,
        &clause_id,
    ));
}

fn handle_import(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let span = span_of(node);
    let decl_qualified = entity_id::import_qualified(&ctx.file_path, "import", span.start_line);
    let decl = Node::new(
        NodeKind::ImportDeclaration,
        "import",
        &decl_qualified,
        &ctx.file_path,
        Language::Go,
        span,
    )
    .with_parent(&ctx.file_id);
    let decl_id = decl.entity_id.clone();
    out.nodes.push(decl);
    out.relationships
        .push(Relationship::new(RelType::Imports, &ctx.file_id, &decl_id));

    emit_import_specs(node, ctx, source, out, &decl_id);
}

fn emit_import_specs(
    node: TsNode<'_>,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    decl_id: &str,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => {
                let Some(path_node) = child.child_by_field_name("path") else {
                    continue;
                };
                let path = unquote(&node_text(path_node, source));
                if path.is_empty() {
                    continue;
                }
                let span = span_of(child);
                let qualified =
                    entity_id::import_qualified(&ctx.file_path, &path, span.start_line);
                let mut spec = Node::new(
                    NodeKind::ImportSpec,
                    path.clone(),
                    &qualified,
                    &ctx.file_path,
                    Language::Go,
                    span,
                )
                .with_parent(decl_id)
                .with_prop("importPath", json!(path));
                if let Some(alias) = child.child_by_field_name("name") {
                    spec = spec.with_prop("alias", json!(node_text(alias, source)));
                }
                let spec_id = spec.entity_id.clone();
                out.nodes.push(spec);
                out.relationships
                    .push(Relationship::new(RelType::Contains, decl_id, &spec_id));
            }
            "import_spec_list" => emit_import_specs(child, ctx, source, out, decl_id),
            _ => {}
        }
    }
}

fn package_qualified(ctx: &Ctx, name: &str) -> String {
    match &ctx.package {
        Some(package) => entity_id::package_qualified(package, name),
        None => entity_id::type_qualified(&ctx.file_path, name),
    }
}

fn handle_function(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::function_qualified(&ctx.file_path, &name, span.start_line);
    let mut function = Node::new(
        NodeKind::GoFunction,
        name.clone(),
        &qualified,
        &ctx.file_path,
        Language::Go,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("isExported", json!(util::is_pascal_case(&name)));
    if let Some(package) = &ctx.package {
        function = function.with_prop("package", json!(package));
    }
    let function_id = function.entity_id.clone();
    out.nodes.push(function);
    out.relationships.push(Relationship::new(
        RelType::Contains,
        &ctx.file_id,
        &function_id,
    ));
    out.relationships.push(Relationship::new(
        RelType::DefinesFunction,
        &ctx.file_id,
        &function_id,
    ));
    emit_parameters(node, &function_id, ctx, source, out);
}

fn handle_method(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let Some(receiver_type) = receiver_type(node, source) else {
        tracing::debug!(file = %ctx.file_path, method = %name, "method without receiver type, skipping");
        return;
    };
    // Methods attach to the receiver struct, qualified by package.
    let struct_qualified = package_qualified(ctx, &receiver_type);
    let struct_id = entity_id::node_id(NodeKind::GoStruct, &struct_qualified);
    let qualified = entity_id::method_qualified(&struct_qualified, &name);
    let method = Node::new(
        NodeKind::GoMethod,
        name,
        &qualified,
        &ctx.file_path,
        Language::Go,
        span_of(node),
    )
    .with_parent(&struct_id)
    .with_prop("receiverType", json!(receiver_type));
    let method_id = method.entity_id.clone();
    out.nodes.push(method);
    out.relationships
        .push(Relationship::new(RelType::HasMethod, &struct_id, &method_id));
    emit_parameters(node, &method_id, ctx, source, out);
}

fn handle_type_spec(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let qualified = package_qualified(ctx, &name);
    match type_node.kind() {
        "struct_type" => {
            let st = Node::new(
                NodeKind::GoStruct,
                name,
                &qualified,
                &ctx.file_path,
                Language::Go,
                span_of(node),
            )
            .with_parent(&ctx.file_id);
            let struct_id = st.entity_id.clone();
            out.nodes.push(st);
            out.relationships.push(Relationship::new(
                RelType::Contains,
                &ctx.file_id,
                &struct_id,
            ));
            out.relationships.push(Relationship::new(
                RelType::DefinesStruct,
                &ctx.file_id,
                &struct_id,
            ));
            emit_struct_fields(type_node, &qualified, &struct_id, ctx, source, out);
        }
        "interface_type" => {
            let iface = Node::new(
                NodeKind::GoInterface,
                name,
                &qualified,
                &ctx.file_path,
                Language::Go,
                span_of(node),
            )
            .with_parent(&ctx.file_id);
            let iface_id = iface.entity_id.clone();
            out.nodes.push(iface);
            out.relationships.push(Relationship::new(
                RelType::Contains,
                &ctx.file_id,
                &iface_id,
            ));
            out.relationships.push(Relationship::new(
                RelType::DefinesInterface,
                &ctx.file_id,
                &iface_id,
            ));
        }
        _ => {}
    }
}

fn emit_struct_fields(
    struct_type: TsNode<'_>,
    struct_qualified: &str,
    struct_id: &str,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
) {
    let Some(field_list) = struct_type
        .child_by_field_name("fields")
        .or_else(|| {
            let mut cursor = struct_type.walk();
            let found = struct_type
                .named_children(&mut cursor)
                .find(|c| c.kind() == "field_declaration_list");
            found
        })
    else {
        return;
    };
    let mut cursor = field_list.walk();
    for field in field_list.named_children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let Some(name_node) = field.child_by_field_name("name") else {
            // Embedded field; skip rather than fabricate a name.
            continue;
        };
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::method_qualified(struct_qualified, &name);
        let mut field_node = Node::new(
            NodeKind::Field,
            name,
            &qualified,
            &ctx.file_path,
            Language::Go,
            span_of(field),
        )
        .with_parent(struct_id);
        if let Some(type_node) = field.child_by_field_name("type") {
            field_node = field_node.with_prop("type", json!(node_text(type_node, source)));
        }
        let field_id = field_node.entity_id.clone();
        out.nodes.push(field_node);
        out.relationships
            .push(Relationship::new(RelType::HasField, struct_id, &field_id));
    }
}

fn emit_parameters(
    node: TsNode<'_>,
    owner_id: &str,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
) {
    let Some(params) = node.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        let Some(name_node) = param.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::parameter_qualified(owner_id, &name);
        let mut param_node = Node::new(
            NodeKind::Parameter,
            name,
            &qualified,
            &ctx.file_path,
            Language::Go,
            span_of(param),
        )
        .with_parent(owner_id);
        if let Some(type_node) = param.child_by_field_name("type") {
            param_node = param_node.with_prop("type", json!(node_text(type_node, source)));
        }
        let param_id = param_node.entity_id.clone();
        out.nodes.push(param_node);
        out.relationships
            .push(Relationship::new(RelType::HasParameter, owner_id, &param_id));
    }
}

fn receiver_type(node: TsNode<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for child in receiver.named_children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            if let Some(type_node) = child.child_by_field_name("type") {
                let text = node_text(type_node, source);
                let text = text.trim_start_matches('*').trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}
