//! Java extraction (Pass 1).

use anyhow::{anyhow, Result};
use serde_json::json;
use tree_sitter::{Node as TsNode, Parser};

use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship, SingleFileParseResult};
use crate::util::{self, node_text, span_of};

pub struct JavaParser {
    parser: Parser,
}

struct Ctx {
    file_path: String,
    file_id: String,
    package: Option<String>,
    /// Current container (qualified, entity id); restored after recursion.
    container: Option<(String, String)>,
}

impl JavaParser {
    pub fn new() -> Result<JavaParser> {
        let mut parser = Parser::new();
        let language = tree_sitter_java::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(JavaParser { parser })
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
            Language::Java,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);

        let mut ctx = Ctx {
            file_path: norm_path.to_string(),
            file_id,
            package: None,
            container: None,
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
        "package_declaration" => handle_package(node, ctx, source, out),
        "import_declaration" => handle_import(node, ctx, source, out),
        "class_declaration" => handle_type(node, ctx, source, out, NodeKind::JavaClass),
        "interface_declaration" => handle_type(node, ctx, source, out, NodeKind::JavaInterface),
        "enum_declaration" => handle_enum(node, ctx, source, out),
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
        if matches!(child.kind(), "scoped_identifier" | "identifier") {
            name = node_text(child, source);
            break;
        }
    }
    if name.is_empty() {
        tracing::debug!(file = %ctx.file_path, "package declaration without a name, skipping");
        return;
    }
    ctx.package = Some(name.clone());
    let package_node = Node::new(
        NodeKind::PackageDeclaration,
        name.clone(),
        &name,
        &ctx.file_path,
        Language::Java,
        span_of(node),
    )
    .with_parent(&ctx.file_id);
    let package_id = package_node.entity_id.clone();
    out.nodes.push(package_node);
    out.relationships.push(Relationship::new(
        RelType::DeclaresPackage,
        &ctx.file_id,
        &package_id,
    ));
}

fn handle_import(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let mut name = String::new();
    let mut is_static = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "scoped_identifier" | "identifier" => name = node_text(child, source),
            _ => {}
        }
    }
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::import_qualified(&ctx.file_path, &name, span.start_line);
    let import = Node::new(
        NodeKind::Import,
        name.clone(),
        &qualified,
        &ctx.file_path,
        Language::Java,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("importedName", json!(name))
    .with_prop("isStatic", json!(is_static));
    let import_id = import.entity_id.clone();
    out.nodes.push(import);
    out.relationships
        .push(Relationship::new(RelType::Imports, &ctx.file_id, &import_id));
}

fn type_qualified_name(ctx: &Ctx, name: &str) -> String {
    match &ctx.package {
        Some(package) => entity_id::package_qualified(package, name),
        None => entity_id::type_qualified(&ctx.file_path, name),
    }
}

fn handle_type(
    node: TsNode<'_>,
    ctx: &mut Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    kind: NodeKind,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        tracing::debug!(file = %ctx.file_path, "type declaration without a name, skipping");
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = type_qualified_name(ctx, &name);
    let mut type_node = Node::new(kind, name, &qualified, &ctx.file_path, Language::Java, span)
        .with_parent(&ctx.file_id)
        .with_prop("isAbstract", json!(has_modifier(node, source, "abstract")));
    if let Some(package) = &ctx.package {
        type_node = type_node.with_prop("package", json!(package));
    }
    let type_id = type_node.entity_id.clone();
    out.nodes.push(type_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &type_id));
    let defines = if kind == NodeKind::JavaInterface {
        RelType::DefinesInterface
    } else {
        RelType::DefinesClass
    };
    out.relationships
        .push(Relationship::new(defines, &ctx.file_id, &type_id));

    emit_heritage(node, source, &type_id, out);

    let previous = ctx.container.replace((qualified, type_id));
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => handle_method(member, ctx, source, out, false),
                "constructor_declaration" => handle_method(member, ctx, source, out, true),
                "field_declaration" => handle_field(member, ctx, source, out),
                "class_declaration" => {
                    handle_type(member, ctx, source, out, NodeKind::JavaClass)
                }
                "interface_declaration" => {
                    handle_type(member, ctx, source, out, NodeKind::JavaInterface)
                }
                _ => {}
            }
        }
    }
    ctx.container = previous;
}

/// Name-based EXTENDS/IMPLEMENTS placeholders; Pass 2 upgrades them when the
/// index knows a single declaration of the right kind and name.
fn emit_heritage(node: TsNode<'_>, source: &str, type_id: &str, out: &mut SingleFileParseResult) {
    if let Some(superclass) = node.child_by_field_name("superclass") {
        for base in heritage_type_names(superclass, source) {
            let target_id = entity_id::node_id(NodeKind::JavaClass, &base);
            out.relationships.push(
                Relationship::new(RelType::Extends, type_id, &target_id)
                    .with_prop("targetName", json!(base))
                    .placeholder(),
            );
        }
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        for base in heritage_type_names(interfaces, source) {
            let target_id = entity_id::node_id(NodeKind::JavaInterface, &base);
            out.relationships.push(
                Relationship::new(RelType::Implements, type_id, &target_id)
                    .with_prop("targetName", json!(base))
                    .placeholder(),
            );
        }
    }
    // Interface extends-list.
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "extends_interfaces" {
            for base in heritage_type_names(child, source) {
                let target_id = entity_id::node_id(NodeKind::JavaInterface, &base);
                out.relationships.push(
                    Relationship::new(RelType::Extends, type_id, &target_id)
                        .with_prop("targetName", json!(base))
                        .placeholder(),
                );
            }
        }
    }
}

fn heritage_type_names(node: TsNode<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    collect_type_identifiers(node, source, &mut names);
    names
}

fn collect_type_identifiers(node: TsNode<'_>, source: &str, out: &mut Vec<String>) {
    if matches!(node.kind(), "type_identifier" | "scoped_type_identifier") {
        let text = node_text(node, source);
        if !text.is_empty() {
            out.push(text);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_type_identifiers(child, source, out);
    }
}

fn handle_method(
    node: TsNode<'_>,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    is_constructor: bool,
) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::method_qualified(&container_qualified, &name);
    let mut method = Node::new(
        NodeKind::JavaMethod,
        name,
        &qualified,
        &ctx.file_path,
        Language::Java,
        span_of(node),
    )
    .with_parent(&container_id)
    .with_prop("isConstructor", json!(is_constructor))
    .with_prop("isStatic", json!(has_modifier(node, source, "static")))
    .with_prop("visibility", json!(visibility(node, source)));
    if let Some(return_type) = node.child_by_field_name("type") {
        method = method.with_prop("returnType", json!(node_text(return_type, source)));
    }
    let method_id = method.entity_id.clone();
    out.nodes.push(method);
    out.relationships.push(Relationship::new(
        RelType::HasMethod,
        &container_id,
        &method_id,
    ));
    emit_parameters(node, &method_id, ctx, source, out);
}

fn handle_field(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::method_qualified(&container_qualified, &name);
        let mut field = Node::new(
            NodeKind::JavaField,
            name,
            &qualified,
            &ctx.file_path,
            Language::Java,
            span_of(declarator),
        )
        .with_parent(&container_id)
        .with_prop("isStatic", json!(has_modifier(node, source, "static")))
        .with_prop("visibility", json!(visibility(node, source)));
        if let Some(type_node) = node.child_by_field_name("type") {
            field = field.with_prop("type", json!(node_text(type_node, source)));
        }
        let field_id = field.entity_id.clone();
        out.nodes.push(field);
        out.relationships
            .push(Relationship::new(RelType::HasField, &container_id, &field_id));
    }
}

fn handle_enum(node: TsNode<'_>, ctx: &mut Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let qualified = type_qualified_name(ctx, &name);
    let enum_node = Node::new(
        NodeKind::TypeAlias,
        name,
        &qualified,
        &ctx.file_path,
        Language::Java,
        span_of(node),
    )
    .with_parent(&ctx.file_id)
    .with_prop("isEnum", json!(true));
    let enum_id = enum_node.entity_id.clone();
    out.nodes.push(enum_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &enum_id));
    out.relationships.push(Relationship::new(
        RelType::DefinesEnum,
        &ctx.file_id,
        &enum_id,
    ));
}

fn emit_parameters(
    node: TsNode<'_>,
    method_id: &str,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
) {
    let Some(params) = node.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if !matches!(param.kind(), "formal_parameter" | "spread_parameter") {
            continue;
        }
        let Some(name_node) = param.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::parameter_qualified(method_id, &name);
        let mut param_node = Node::new(
            NodeKind::Parameter,
            name,
            &qualified,
            &ctx.file_path,
            Language::Java,
            span_of(param),
        )
        .with_parent(method_id);
        if let Some(type_node) = param.child_by_field_name("type") {
            param_node = param_node.with_prop("type", json!(node_text(type_node, source)));
        }
        let param_id = param_node.entity_id.clone();
        out.nodes.push(param_node);
        out.relationships
            .push(Relationship::new(RelType::HasParameter, method_id, &param_id));
    }
}

fn has_modifier(node: TsNode<'_>, source: &str, modifier: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "modifiers" {
            return node_text(child, source)
                .split_whitespace()
                .any(|m| m == modifier);
        }
    }
    false
}

fn visibility(node: TsNode<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "modifiers" {
            let text = node_text(child, source);
            for candidate in ["public", "private", "protected"] {
                if text.split_whitespace().any(|m| m == candidate) {
                    return candidate.to_string();
                }
            }
        }
    }
    "package".to_string()
}
