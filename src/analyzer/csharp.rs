//! C# extraction (Pass 1).
//!
//! The traversal context carries both the current namespace and the current
//! container; both are restored when the declaring node is left.

use anyhow::{anyhow, Result};
use serde_json::json;
use tree_sitter::{Node as TsNode, Parser};

use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship, SingleFileParseResult};
use crate::util::{self, node_text, span_of};

pub struct CSharpParser {
    parser: Parser,
}

#[derive(Clone)]
struct Ctx {
    file_path: String,
    file_id: String,
    namespace_stack: Vec<String>,
    /// Current container (qualified, entity id).
    container: Option<(String, String)>,
}

impl CSharpParser {
    pub fn new() -> Result<CSharpParser> {
        let mut parser = Parser::new();
        let language = tree_sitter_c_sharp::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(CSharpParser { parser })
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
            Language::CSharp,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);

        let ctx = Ctx {
            file_path: norm_path.to_string(),
            file_id,
            namespace_stack: Vec::new(),
            container: None,
        };
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            walk_node(child, &ctx, source, &mut out);
            // A file-scoped namespace consumes every following sibling.
            if child.kind() == "file_scoped_namespace_declaration" {
                break;
            }
        }
        Ok(out)
    }
}

fn walk_node(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    match node.kind() {
        "using_directive" => handle_using(node, ctx, source, out),
        "namespace_declaration" | "file_scoped_namespace_declaration" => {
            handle_namespace(node, ctx, source, out);
        }
        "class_declaration" => handle_type(node, ctx, source, out, NodeKind::CSharpClass),
        "interface_declaration" => handle_type(node, ctx, source, out, NodeKind::CSharpInterface),
        "struct_declaration" => handle_type(node, ctx, source, out, NodeKind::CSharpStruct),
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_node(child, ctx, source, out);
            }
        }
    }
}

fn handle_using(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let mut name = String::new();
    let mut is_static = false;
    let mut alias: Option<String> = None;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "identifier" | "qualified_name" => name = node_text(child, source),
            "name_equals" => {
                alias = child
                    .named_child(0)
                    .map(|n| node_text(n, source))
                    .filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::import_qualified(&ctx.file_path, &name, span.start_line);
    let mut using = Node::new(
        NodeKind::UsingDirective,
        name.clone(),
        &qualified,
        &ctx.file_path,
        Language::CSharp,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("namespace", json!(name))
    .with_prop("isStatic", json!(is_static));
    if let Some(alias) = alias {
        using = using.with_prop("alias", json!(alias));
    }
    let using_id = using.entity_id.clone();
    out.nodes.push(using);
    out.relationships
        .push(Relationship::new(RelType::Imports, &ctx.file_id, &using_id));
}

fn handle_namespace(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let mut stack = ctx.namespace_stack.clone();
    stack.extend(name.split('.').map(str::to_string));
    let qualified = stack.join(".");
    let ns_node = Node::new(
        NodeKind::NamespaceDeclaration,
        name,
        &qualified,
        &ctx.file_path,
        Language::CSharp,
        span_of(node),
    )
    .with_parent(&ctx.file_id);
    let ns_id = ns_node.entity_id.clone();
    out.nodes.push(ns_node);
    out.relationships.push(Relationship::new(
        RelType::DeclaresNamespace,
        &ctx.file_id,
        &ns_id,
    ));

    let mut next = ctx.clone();
    next.namespace_stack = stack;
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            walk_node(child, &next, source, out);
        }
    } else {
        // File-scoped namespace: the remaining siblings live inside it.
        let mut sibling = node.next_named_sibling();
        while let Some(current) = sibling {
            walk_node(current, &next, source, out);
            sibling = current.next_named_sibling();
        }
    }
}

fn qualified_type_name(ctx: &Ctx, name: &str) -> String {
    if ctx.namespace_stack.is_empty() {
        entity_id::type_qualified(&ctx.file_path, name)
    } else {
        entity_id::package_qualified(&ctx.namespace_stack.join("."), name)
    }
}

fn handle_type(
    node: TsNode<'_>,
    ctx: &Ctx,
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
    let qualified = qualified_type_name(ctx, &name);
    let mut type_node = Node::new(
        kind,
        name,
        &qualified,
        &ctx.file_path,
        Language::CSharp,
        span_of(node),
    )
    .with_parent(&ctx.file_id);
    if !ctx.namespace_stack.is_empty() {
        type_node = type_node.with_prop("namespace", json!(ctx.namespace_stack.join(".")));
    }
    let type_id = type_node.entity_id.clone();
    out.nodes.push(type_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &type_id));
    let defines = match kind {
        NodeKind::CSharpInterface => RelType::DefinesInterface,
        NodeKind::CSharpStruct => RelType::DefinesStruct,
        _ => RelType::DefinesClass,
    };
    out.relationships
        .push(Relationship::new(defines, &ctx.file_id, &type_id));

    emit_base_list(node, source, &type_id, kind, out);

    let mut next = ctx.clone();
    next.container = Some((qualified, type_id));
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => handle_method(member, &next, source, out, false),
                "constructor_declaration" => handle_method(member, &next, source, out, true),
                "property_declaration" => handle_property(member, &next, source, out),
                "field_declaration" => handle_field(member, &next, source, out),
                "class_declaration" => {
                    handle_type(member, &next, source, out, NodeKind::CSharpClass)
                }
                "interface_declaration" => {
                    handle_type(member, &next, source, out, NodeKind::CSharpInterface)
                }
                "struct_declaration" => {
                    handle_type(member, &next, source, out, NodeKind::CSharpStruct)
                }
                _ => {}
            }
        }
    }
}

/// For classes the first base is EXTENDS and the rest IMPLEMENTS; interfaces
/// only EXTEND; structs only IMPLEMENT. All targets start as placeholders.
fn emit_base_list(
    node: TsNode<'_>,
    source: &str,
    type_id: &str,
    kind: NodeKind,
    out: &mut SingleFileParseResult,
) {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "base_list" {
            continue;
        }
        let mut inner = child.walk();
        for base in child.named_children(&mut inner) {
            let text = node_text(base, source);
            if !text.is_empty() {
                bases.push(text);
            }
        }
    }
    if bases.is_empty() {
        return;
    }
    let mut emit = |rel_type: RelType, base: String, target_kind: NodeKind| {
        let target_id = entity_id::node_id(target_kind, &base);
        out.relationships.push(
            Relationship::new(rel_type, type_id, &target_id)
                .with_prop("targetName", json!(base))
                .placeholder(),
        );
    };
    match kind {
        NodeKind::CSharpInterface => {
            for base in bases {
                emit(RelType::Extends, base, NodeKind::CSharpInterface);
            }
        }
        NodeKind::CSharpStruct => {
            for base in bases {
                emit(RelType::Implements, base, NodeKind::CSharpInterface);
            }
        }
        _ => {
            let mut iter = bases.into_iter();
            if let Some(first) = iter.next() {
                emit(RelType::Extends, first, NodeKind::CSharpClass);
            }
            for base in iter {
                emit(RelType::Implements, base, NodeKind::CSharpInterface);
            }
        }
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
        NodeKind::CSharpMethod,
        name,
        &qualified,
        &ctx.file_path,
        Language::CSharp,
        span_of(node),
    )
    .with_parent(&container_id)
    .with_prop("isConstructor", json!(is_constructor))
    .with_prop("isStatic", json!(has_modifier(node, source, "static")))
    .with_prop("isAsync", json!(has_modifier(node, source, "async")))
    .with_prop("visibility", json!(visibility(node, source)));
    if let Some(returns) = node.child_by_field_name("returns") {
        method = method.with_prop("returnType", json!(node_text(returns, source)));
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

fn handle_property(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
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
    let mut prop = Node::new(
        NodeKind::Property,
        name,
        &qualified,
        &ctx.file_path,
        Language::CSharp,
        span_of(node),
    )
    .with_parent(&container_id)
    .with_prop("visibility", json!(visibility(node, source)));
    if let Some(type_node) = node.child_by_field_name("type") {
        prop = prop.with_prop("type", json!(node_text(type_node, source)));
    }
    let prop_id = prop.entity_id.clone();
    out.nodes.push(prop);
    out.relationships.push(Relationship::new(
        RelType::HasProperty,
        &container_id,
        &prop_id,
    ));
}

fn handle_field(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let mut cursor = node.walk();
    for declaration in node.named_children(&mut cursor) {
        if declaration.kind() != "variable_declaration" {
            continue;
        }
        let mut inner = declaration.walk();
        for declarator in declaration.named_children(&mut inner) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator
                .child_by_field_name("name")
                .map(|n| node_text(n, source))
                .filter(|n| !n.is_empty())
                .or_else(|| first_identifier(declarator, source))
            else {
                continue;
            };
            let qualified = entity_id::method_qualified(&container_qualified, &name);
            let field = Node::new(
                NodeKind::Field,
                name,
                &qualified,
                &ctx.file_path,
                Language::CSharp,
                span_of(declarator),
            )
            .with_parent(&container_id)
            .with_prop("isStatic", json!(has_modifier(node, source, "static")))
            .with_prop("visibility", json!(visibility(node, source)));
            let field_id = field.entity_id.clone();
            out.nodes.push(field);
            out.relationships.push(Relationship::new(
                RelType::HasField,
                &container_id,
                &field_id,
            ));
        }
    }
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
        if param.kind() != "parameter" {
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
            Language::CSharp,
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

fn first_identifier(node: TsNode<'_>, source: &str) -> Option<String> {
    if node.kind() == "identifier" {
        let text = node_text(node, source);
        if !text.is_empty() {
            return Some(text);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

fn has_modifier(node: TsNode<'_>, source: &str, modifier: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "modifier" || child.kind() == "modifiers" {
            if node_text(child, source)
                .split_whitespace()
                .any(|m| m == modifier)
            {
                return true;
            }
        }
    }
    false
}

fn visibility(node: TsNode<'_>, source: &str) -> String {
    for candidate in ["public", "private", "protected", "internal"] {
        if has_modifier(node, source, candidate) {
            return candidate.to_string();
        }
    }
    "internal".to_string()
}
