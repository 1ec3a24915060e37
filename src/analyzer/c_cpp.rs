//! C/C++ extraction (Pass 1), via the tree-sitter C++ grammar.
//!
//! The C++ grammar occasionally mis-parses a class or struct declaration as a
//! `function_definition`; those are recognized by their literal text prefix
//! and treated as class specifiers.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::collections::HashMap;
use tree_sitter::{Node as TsNode, Parser};

use crate::entity_id;
use crate::model::{Language, Node, NodeKind, RelType, Relationship, SingleFileParseResult};
use crate::util::{self, node_text, span_of};

pub struct CppParser {
    parser: Parser,
}

struct Ctx {
    file_path: String,
    file_id: String,
    language: Language,
    namespace: Vec<String>,
    /// Classes declared in this file, by bare name: (qualified, entity id).
    classes: HashMap<String, (String, String)>,
}

impl CppParser {
    pub fn new() -> Result<CppParser> {
        let mut parser = Parser::new();
        let language = tree_sitter_cpp::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(CppParser { parser })
    }

    pub fn parse(
        &mut self,
        norm_path: &str,
        language: Language,
        source: &str,
    ) -> Result<SingleFileParseResult> {
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
            language,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);

        let mut ctx = Ctx {
            file_path: norm_path.to_string(),
            file_id,
            language,
            namespace: Vec::new(),
            classes: HashMap::new(),
        };
        walk_node(root, &mut ctx, source, &mut out);
        Ok(out)
    }
}

fn walk_node(node: TsNode<'_>, ctx: &mut Ctx, source: &str, out: &mut SingleFileParseResult) {
    match node.kind() {
        "preproc_include" => handle_include(node, ctx, source, out),
        "preproc_def" | "preproc_function_def" => handle_macro(node, ctx, source, out),
        "class_specifier" => handle_class(node, ctx, source, out, false),
        "struct_specifier" => handle_class(node, ctx, source, out, true),
        "enum_specifier" => handle_enum(node, ctx, source, out),
        "namespace_definition" => handle_namespace(node, ctx, source, out),
        "function_definition" => {
            let text = node_text(node, source);
            // Grammar quirk: a class/struct declaration occasionally parses
            // as a function definition.
            if text.starts_with("class ") || text.starts_with("struct ") {
                tracing::debug!(file = %ctx.file_path, "class/struct mis-parsed as function_definition");
                handle_misparsed_class(node, ctx, source, out, text.starts_with("struct "));
            } else {
                handle_function(node, ctx, source, out);
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

fn handle_include(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(path_node) = node.child_by_field_name("path") else {
        return;
    };
    let raw = node_text(path_node, source);
    let is_system = raw.starts_with('<');
    let include_path = raw
        .trim_matches(|c| c == '<' || c == '>' || c == '"')
        .to_string();
    if include_path.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::import_qualified(&ctx.file_path, &include_path, span.start_line);
    let include = Node::new(
        NodeKind::IncludeDirective,
        include_path.clone(),
        &qualified,
        &ctx.file_path,
        ctx.language,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("includePath", json!(include_path))
    .with_prop("isSystemInclude", json!(is_system));
    let include_id = include.entity_id.clone();
    out.nodes.push(include);
    out.relationships
        .push(Relationship::new(RelType::Includes, &ctx.file_id, &include_id));
}

fn handle_macro(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::variable_qualified(&ctx.file_path, &name, span.start_line);
    let macro_node = Node::new(
        NodeKind::MacroDefinition,
        name,
        &qualified,
        &ctx.file_path,
        ctx.language,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("isFunctionLike", json!(node.kind() == "preproc_function_def"));
    let macro_id = macro_node.entity_id.clone();
    out.nodes.push(macro_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &macro_id));
}

fn class_qualified_name(ctx: &Ctx, name: &str) -> String {
    if ctx.namespace.is_empty() {
        entity_id::type_qualified(&ctx.file_path, name)
    } else {
        entity_id::package_qualified(&ctx.namespace.join("."), name)
    }
}

fn handle_class(
    node: TsNode<'_>,
    ctx: &mut Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    is_struct: bool,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        // Anonymous specifier (e.g. a typedef struct); nothing to anchor on.
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = class_qualified_name(ctx, &name);
    let class_node = Node::new(
        NodeKind::CppClass,
        name.clone(),
        &qualified,
        &ctx.file_path,
        ctx.language,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("isStruct", json!(is_struct));
    let class_id = class_node.entity_id.clone();
    out.nodes.push(class_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &class_id));
    out.relationships.push(Relationship::new(
        RelType::DefinesClass,
        &ctx.file_id,
        &class_id,
    ));
    ctx.classes
        .insert(name.clone(), (qualified.clone(), class_id.clone()));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let default_visibility = if is_struct { "public" } else { "private" };
    let mut visibility = default_visibility.to_string();
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "access_specifier" => {
                visibility = node_text(member, source).trim_end_matches(':').to_string();
            }
            "function_definition" => {
                emit_method(member, ctx, source, out, &qualified, &class_id, &visibility);
            }
            "field_declaration" => {
                if find_function_declarator(member).is_some() {
                    // Method declaration without a body.
                    emit_method(member, ctx, source, out, &qualified, &class_id, &visibility);
                } else {
                    emit_field(member, ctx, source, out, &qualified, &class_id, &visibility);
                }
            }
            _ => {}
        }
    }
}

fn handle_misparsed_class(
    node: TsNode<'_>,
    ctx: &mut Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    is_struct: bool,
) {
    let text = node_text(node, source);
    let keyword_len = if is_struct { "struct ".len() } else { "class ".len() };
    let rest = &text[keyword_len..];
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        tracing::debug!(file = %ctx.file_path, "mis-parsed class has no extractable name, skipping");
        return;
    }
    let span = span_of(node);
    let qualified = class_qualified_name(ctx, &name);
    let class_node = Node::new(
        NodeKind::CppClass,
        name.clone(),
        &qualified,
        &ctx.file_path,
        ctx.language,
        span,
    )
    .with_parent(&ctx.file_id)
    .with_prop("isStruct", json!(is_struct));
    let class_id = class_node.entity_id.clone();
    out.nodes.push(class_node);
    out.relationships
        .push(Relationship::new(RelType::Contains, &ctx.file_id, &class_id));
    out.relationships.push(Relationship::new(
        RelType::DefinesClass,
        &ctx.file_id,
        &class_id,
    ));
    ctx.classes.insert(name, (qualified, class_id));
}

fn handle_enum(node: TsNode<'_>, ctx: &Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let qualified = class_qualified_name(ctx, &name);
    let enum_node = Node::new(
        NodeKind::TypeAlias,
        name,
        &qualified,
        &ctx.file_path,
        ctx.language,
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

fn handle_namespace(
    node: TsNode<'_>,
    ctx: &mut Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
) {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    if !name.is_empty() {
        let qualified = if ctx.namespace.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", ctx.namespace.join("."), name)
        };
        let ns_node = Node::new(
            NodeKind::NamespaceDeclaration,
            name.clone(),
            &qualified,
            &ctx.file_path,
            ctx.language,
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
    }

    if let Some(body) = node.child_by_field_name("body") {
        if name.is_empty() {
            walk_node(body, ctx, source, out);
        } else {
            ctx.namespace.push(name);
            walk_node(body, ctx, source, out);
            ctx.namespace.pop();
        }
    }
}

fn handle_function(node: TsNode<'_>, ctx: &mut Ctx, source: &str, out: &mut SingleFileParseResult) {
    let Some(declarator) = find_function_declarator(node) else {
        return;
    };
    let Some(name_node) = declarator.child_by_field_name("declarator") else {
        return;
    };
    let raw_name = node_text(name_node, source);
    if raw_name.is_empty() {
        return;
    }
    let span = span_of(node);

    if let Some((class_name, method_name)) = split_qualified(&raw_name) {
        // Out-of-class definition such as `Circle::area`. Membership is
        // syntactically certain, so it becomes a CppMethod either way; the
        // containment edge needs the class declared in this file.
        let class_entry = ctx.classes.get(&class_name).cloned();
        let class_qualified = class_entry
            .as_ref()
            .map(|(qualified, _)| qualified.clone())
            .unwrap_or_else(|| class_qualified_name(ctx, &class_name));
        let qualified = entity_id::method_qualified(&class_qualified, &method_name);
        let method = Node::new(
            NodeKind::CppMethod,
            method_name,
            &qualified,
            &ctx.file_path,
            ctx.language,
            span,
        )
        .with_parent(&ctx.file_id)
        .with_prop("parentClass", json!(class_name));
        let method_id = method.entity_id.clone();
        out.nodes.push(method);
        if let Some((_, class_id)) = class_entry {
            out.relationships
                .push(Relationship::new(RelType::HasMethod, &class_id, &method_id));
        }
        emit_parameters(declarator, &method_id, ctx, source, out);
    } else {
        let qualified = entity_id::function_qualified(&ctx.file_path, &raw_name, span.start_line);
        let function = Node::new(
            NodeKind::CFunction,
            raw_name,
            &qualified,
            &ctx.file_path,
            ctx.language,
            span,
        )
        .with_parent(&ctx.file_id);
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
        emit_parameters(declarator, &function_id, ctx, source, out);
    }
}

fn emit_method(
    node: TsNode<'_>,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    class_qualified: &str,
    class_id: &str,
    visibility: &str,
) {
    let Some(declarator) = find_function_declarator(node) else {
        return;
    };
    let Some(name_node) = declarator.child_by_field_name("declarator") else {
        return;
    };
    let name = node_text(name_node, source);
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::method_qualified(class_qualified, &name);
    let method = Node::new(
        NodeKind::CppMethod,
        name,
        &qualified,
        &ctx.file_path,
        ctx.language,
        span_of(node),
    )
    .with_parent(class_id)
    .with_prop("visibility", json!(visibility));
    let method_id = method.entity_id.clone();
    out.nodes.push(method);
    out.relationships
        .push(Relationship::new(RelType::HasMethod, class_id, &method_id));
    emit_parameters(declarator, &method_id, ctx, source, out);
}

fn emit_field(
    node: TsNode<'_>,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
    class_qualified: &str,
    class_id: &str,
    visibility: &str,
) {
    let Some(declarator) = node.child_by_field_name("declarator") else {
        return;
    };
    let name = match declarator.kind() {
        "field_identifier" | "identifier" => node_text(declarator, source),
        _ => first_field_identifier(declarator, source).unwrap_or_default(),
    };
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::method_qualified(class_qualified, &name);
    let field = Node::new(
        NodeKind::Field,
        name,
        &qualified,
        &ctx.file_path,
        ctx.language,
        span_of(node),
    )
    .with_parent(class_id)
    .with_prop("visibility", json!(visibility));
    let field_id = field.entity_id.clone();
    out.nodes.push(field);
    out.relationships
        .push(Relationship::new(RelType::HasField, class_id, &field_id));
}

fn emit_parameters(
    declarator: TsNode<'_>,
    owner_id: &str,
    ctx: &Ctx,
    source: &str,
    out: &mut SingleFileParseResult,
) {
    let Some(params) = declarator.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        let Some(name) = param
            .child_by_field_name("declarator")
            .and_then(|d| first_field_identifier(d, source))
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::parameter_qualified(owner_id, &name);
        let mut param_node = Node::new(
            NodeKind::Parameter,
            name,
            &qualified,
            &ctx.file_path,
            ctx.language,
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

fn find_function_declarator<'t>(node: TsNode<'t>) -> Option<TsNode<'t>> {
    if node.kind() == "function_declarator" {
        return Some(node);
    }
    if let Some(declarator) = node.child_by_field_name("declarator") {
        if let Some(found) = find_function_declarator(declarator) {
            return Some(found);
        }
    }
    None
}

fn first_field_identifier(node: TsNode<'_>, source: &str) -> Option<String> {
    if matches!(node.kind(), "identifier" | "field_identifier") {
        let text = node_text(node, source);
        if !text.is_empty() {
            return Some(text);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_field_identifier(child, source) {
            return Some(found);
        }
    }
    None
}

fn split_qualified(raw: &str) -> Option<(String, String)> {
    let idx = raw.rfind("::")?;
    let class_part = raw[..idx].rsplit("::").next().unwrap_or(&raw[..idx]);
    let method = &raw[idx + 2..];
    if class_part.is_empty() || method.is_empty() {
        return None;
    }
    Some((class_part.to_string(), method.to_string()))
}
