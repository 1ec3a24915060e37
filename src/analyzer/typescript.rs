//! TypeScript / JavaScript / TSX extraction (Pass 1).
//!
//! All TS-family files for a run are parsed into one shared [`TsProject`] so
//! the Pass-2 resolver can follow imports across files and re-walk function
//! bodies with the trees still in memory.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tree_sitter::{Node as TsNode, Parser, Tree};

use crate::entity_id;
use crate::model::{
    Language, Node, NodeKind, Properties, RelType, Relationship, SingleFileParseResult,
};
use crate::util::{self, node_text, span_of, unquote};

const COMPONENT_RETURN_TYPES: &[&str] = &["JSX.Element", "ReactElement", "React.FC"];

pub struct TsFile {
    pub norm_path: String,
    pub language: Language,
    pub source: String,
    pub tree: Tree,
}

/// Shared project owning every TS/JS source file of the run.
pub struct TsProject {
    ts_parser: Parser,
    tsx_parser: Parser,
    js_parser: Parser,
    files: BTreeMap<String, TsFile>,
}

impl TsProject {
    pub fn new() -> Result<TsProject> {
        let mut ts_parser = Parser::new();
        ts_parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?;
        let mut tsx_parser = Parser::new();
        tsx_parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?;
        let mut js_parser = Parser::new();
        js_parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
        Ok(TsProject {
            ts_parser,
            tsx_parser,
            js_parser,
            files: BTreeMap::new(),
        })
    }

    pub fn add_file(
        &mut self,
        norm_path: &str,
        language: Language,
        source: String,
    ) -> Result<()> {
        let parser = match language {
            Language::TypeScript => &mut self.ts_parser,
            Language::Tsx => &mut self.tsx_parser,
            Language::JavaScript => &mut self.js_parser,
            other => return Err(anyhow!("{} is not a TS-family language", other.as_str())),
        };
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| anyhow!("tree-sitter returned no tree for {norm_path}"))?;
        self.files.insert(
            norm_path.to_string(),
            TsFile {
                norm_path: norm_path.to_string(),
                language,
                source,
                tree,
            },
        );
        Ok(())
    }

    pub fn get(&self, norm_path: &str) -> Option<&TsFile> {
        self.files.get(norm_path)
    }

    pub fn files(&self) -> impl Iterator<Item = &TsFile> {
        self.files.values()
    }

    pub fn contains(&self, norm_path: &str) -> bool {
        self.files.contains_key(norm_path)
    }

    /// Pass-1 extraction for one file of the project.
    pub fn extract(&self, file: &TsFile) -> Result<SingleFileParseResult> {
        let mut extract = Extract::new(file);
        let root = file.tree.root_node();
        let ctx = Ctx::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            walk_node(child, &ctx, &mut extract);
        }
        extract.apply_export_lists();
        Ok(extract.out)
    }
}

#[derive(Clone, Default)]
struct Ctx {
    /// Qualified name and entity id of the enclosing class/interface.
    container: Option<(String, String)>,
    /// Entity id of the enclosing function-like.
    current_fn: Option<String>,
    /// Entity id of the nearest enclosing Component node.
    component: Option<String>,
    /// Entity id of the nearest enclosing JSXElement node.
    jsx_parent: Option<String>,
    exported: bool,
    default_export: bool,
}

impl Ctx {
    fn without_export(&self) -> Ctx {
        let mut next = self.clone();
        next.exported = false;
        next.default_export = false;
        next
    }
}

struct Extract<'a> {
    file: &'a TsFile,
    file_id: String,
    out: SingleFileParseResult,
    tailwind_seen: HashSet<String>,
    /// Names re-exported by `export { a, b }` lists, applied after the walk.
    export_lists: Vec<String>,
}

impl<'a> Extract<'a> {
    fn new(file: &'a TsFile) -> Extract<'a> {
        let mut out = SingleFileParseResult::new(&file.norm_path);
        let root = file.tree.root_node();
        let file_node = Node::new(
            NodeKind::File,
            util::file_basename(&file.norm_path),
            &file.norm_path,
            &file.norm_path,
            file.language,
            span_of(root),
        );
        let file_id = file_node.entity_id.clone();
        out.nodes.push(file_node);
        Extract {
            file,
            file_id,
            out,
            tailwind_seen: HashSet::new(),
            export_lists: Vec::new(),
        }
    }

    fn source(&self) -> &str {
        &self.file.source
    }

    fn path(&self) -> &str {
        &self.file.norm_path
    }

    fn push_node(&mut self, node: Node) -> String {
        let id = node.entity_id.clone();
        self.out.nodes.push(node);
        id
    }

    fn push_rel(&mut self, rel: Relationship) {
        self.out.relationships.push(rel);
    }

    fn apply_export_lists(&mut self) {
        if self.export_lists.is_empty() {
            return;
        }
        let names: HashSet<String> = self.export_lists.drain(..).collect();
        let mut exported_ids = Vec::new();
        for node in self.out.nodes.iter_mut() {
            if names.contains(&node.name)
                && matches!(
                    node.kind,
                    NodeKind::Function
                        | NodeKind::Class
                        | NodeKind::Interface
                        | NodeKind::Variable
                        | NodeKind::TypeAlias
                        | NodeKind::Component
                )
            {
                node.properties.insert("isExported".into(), json!(true));
                exported_ids.push(node.entity_id.clone());
            }
        }
        for id in exported_ids {
            let file_id = self.file_id.clone();
            self.push_rel(Relationship::new(RelType::Exports, &file_id, &id));
        }
    }
}

fn walk_node(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    match node.kind() {
        "import_statement" => handle_import(node, extract),
        "export_statement" => handle_export(node, ctx, extract),
        "class_declaration" | "abstract_class_declaration" => {
            handle_class(node, ctx, extract);
        }
        "interface_declaration" => handle_interface(node, ctx, extract),
        "type_alias_declaration" => handle_type_alias(node, ctx, extract, false),
        "enum_declaration" => handle_type_alias(node, ctx, extract, true),
        "lexical_declaration" | "variable_declaration" => {
            handle_variable_statement(node, ctx, extract);
        }
        "function_declaration"
        | "generator_function_declaration"
        | "function_expression"
        | "generator_function"
        | "arrow_function" => {
            handle_function_like(node, ctx, extract);
        }
        "jsx_element" | "jsx_self_closing_element" => {
            handle_jsx_element(node, ctx, extract);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_node(child, ctx, extract);
            }
        }
    }
}

fn handle_export(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let mut is_default = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "default" {
            is_default = true;
        }
    }
    let mut next = ctx.clone();
    next.exported = true;
    next.default_export = is_default;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "export_clause" {
            let mut inner = child.walk();
            for spec in child.named_children(&mut inner) {
                if spec.kind() == "export_specifier" {
                    if let Some(name) = spec.child_by_field_name("name") {
                        extract.export_lists.push(node_text(name, extract.source()));
                    }
                }
            }
        } else {
            walk_node(child, &next, extract);
        }
    }
}

// --- imports ---

fn handle_import(node: TsNode<'_>, extract: &mut Extract<'_>) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = unquote(&node_text(source_node, extract.source()));
    if specifier.is_empty() {
        return;
    }
    let span = span_of(node);
    let mut is_type_only = false;
    let mut default_import: Option<String> = None;
    let mut namespace_import: Option<String> = None;
    let mut named: Vec<Value> = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "type" => is_type_only = true,
            "import_clause" => {
                let mut inner = child.walk();
                for part in child.named_children(&mut inner) {
                    match part.kind() {
                        "identifier" => {
                            default_import = Some(node_text(part, extract.source()));
                        }
                        "namespace_import" => {
                            namespace_import = first_identifier(part, extract.source());
                        }
                        "named_imports" => {
                            let mut specs = part.walk();
                            for spec in part.named_children(&mut specs) {
                                if spec.kind() != "import_specifier" {
                                    continue;
                                }
                                let name = spec
                                    .child_by_field_name("name")
                                    .map(|n| node_text(n, extract.source()));
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .map(|n| node_text(n, extract.source()));
                                if let Some(name) = name {
                                    named.push(json!({ "name": name, "alias": alias }));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let qualified = entity_id::import_qualified(extract.path(), &specifier, span.start_line);
    let import_node = Node::new(
        NodeKind::Import,
        specifier.clone(),
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_parent(&extract.file_id)
    .with_prop("moduleSpecifier", json!(specifier))
    .with_prop("namedImports", Value::Array(named))
    .with_prop("defaultImport", json!(default_import))
    .with_prop("namespaceImport", json!(namespace_import))
    .with_prop("isTypeOnly", json!(is_type_only));
    let import_id = extract.push_node(import_node);
    let file_id = extract.file_id.clone();
    extract.push_rel(Relationship::new(RelType::Imports, &file_id, &import_id));
}

// --- function-likes ---

/// Name for any function-like node, shared with the Pass-2 resolver so both
/// passes derive identical qualified names:
/// - declared name, when the node has one;
/// - the binding name, when assigned to a variable declarator;
/// - `callback_<caller>_arg<N>` for anonymous call arguments;
/// - `anonymousLambda` otherwise.
pub fn function_like_name(node: TsNode<'_>, source: &str) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        let text = node_text(name, source);
        if !text.is_empty() {
            return text;
        }
    }
    let mut current = node;
    // Unwrap parenthesized/awaited wrappers between the function and its site.
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "parenthesized_expression" | "await_expression" => current = parent,
            "variable_declarator" => {
                if let Some(name) = parent.child_by_field_name("name") {
                    let text = node_text(name, source);
                    if !text.is_empty() {
                        return text;
                    }
                }
                break;
            }
            "pair" => {
                if let Some(key) = parent.child_by_field_name("key") {
                    let text = node_text(key, source);
                    if !text.is_empty() {
                        return text;
                    }
                }
                break;
            }
            "arguments" => {
                if let Some(call) = parent.parent() {
                    if call.kind() == "call_expression" {
                        let callee = call
                            .child_by_field_name("function")
                            .map(|f| node_text(f, source))
                            .unwrap_or_default();
                        let mut index = 0;
                        let mut cursor = parent.walk();
                        for (position, arg) in parent.named_children(&mut cursor).enumerate() {
                            if arg.id() == current.id() {
                                index = position;
                                break;
                            }
                        }
                        return format!("callback_{}_arg{}", sanitize_name(&callee), index);
                    }
                }
                break;
            }
            _ => break,
        }
    }
    "anonymousLambda".to_string()
}

fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

fn handle_function_like(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let name = function_like_name(node, extract.source());
    let span = span_of(node);
    let qualified = entity_id::function_qualified(extract.path(), &name, span.start_line);
    let return_type = return_type_text(node, extract.source());
    let mut fn_node = Node::new(
        NodeKind::Function,
        name.clone(),
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_prop("isExported", json!(ctx.exported))
    .with_prop("isDefaultExport", json!(ctx.default_export))
    .with_prop("isAsync", json!(has_keyword_child(node, "async")))
    .with_prop(
        "isGenerator",
        json!(node.kind().contains("generator") || has_keyword_child(node, "*")),
    )
    .with_prop("complexity", json!(cyclomatic_complexity(node)))
    .with_prop("loc", json!(span.end_line - span.start_line + 1));
    if let Some(ret) = &return_type {
        fn_node = fn_node.with_prop("returnType", json!(ret));
    }
    if let Some((text, tags)) = jsdoc_for(node, extract.source()) {
        fn_node = fn_node
            .with_prop("documentation", json!(text))
            .with_prop("jsdocTags", json!(tags));
    }
    let parent_id = ctx
        .current_fn
        .clone()
        .unwrap_or_else(|| extract.file_id.clone());
    let fn_id = extract.push_node(fn_node.with_parent(&parent_id));

    if ctx.current_fn.is_none() && ctx.container.is_none() {
        let file_id = extract.file_id.clone();
        extract.push_rel(Relationship::new(RelType::Contains, &file_id, &fn_id));
        extract.push_rel(Relationship::new(RelType::DefinesFunction, &file_id, &fn_id));
        if ctx.exported {
            extract.push_rel(Relationship::new(RelType::Exports, &file_id, &fn_id));
        }
    }

    emit_parameters(node, &fn_id, extract);

    let mut next = ctx.without_export();
    next.current_fn = Some(fn_id.clone());

    // PascalCase + JSX (or a React-ish return type) makes this a component.
    if util::is_pascal_case(&name) && (has_jsx_descendant(node) || is_component_type(&return_type))
    {
        let comp_id = emit_component(&name, span_of(node), ctx, extract);
        next.component = Some(comp_id);
    }

    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next, extract);
    }
}

fn emit_component(
    name: &str,
    span: crate::model::Span,
    ctx: &Ctx,
    extract: &mut Extract<'_>,
) -> String {
    let qualified = entity_id::type_qualified(extract.path(), name);
    let comp = Node::new(
        NodeKind::Component,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_parent(&extract.file_id)
    .with_prop("isExported", json!(ctx.exported))
    .with_prop("isDefaultExport", json!(ctx.default_export));
    let comp_id = extract.push_node(comp);
    let file_id = extract.file_id.clone();
    extract.push_rel(Relationship::new(RelType::Contains, &file_id, &comp_id));
    extract.push_rel(Relationship::new(
        RelType::DefinesComponent,
        &file_id,
        &comp_id,
    ));
    comp_id
}

fn emit_parameters(node: TsNode<'_>, fn_id: &str, extract: &mut Extract<'_>) {
    let Some(params) = node.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let (name, optional) = match param.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = param
                    .child_by_field_name("pattern")
                    .and_then(|p| first_identifier(p, extract.source()))
                    .or_else(|| first_identifier(param, extract.source()));
                (name, param.kind() == "optional_parameter")
            }
            "identifier" => (Some(node_text(param, extract.source())), false),
            "assignment_pattern" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                (first_identifier(param, extract.source()), false)
            }
            _ => (None, false),
        };
        let Some(name) = name else { continue };
        if name.is_empty() {
            continue;
        }
        let qualified = entity_id::parameter_qualified(fn_id, &name);
        let mut param_node = Node::new(
            NodeKind::Parameter,
            name,
            &qualified,
            extract.path(),
            extract.file.language,
            span_of(param),
        )
        .with_parent(fn_id)
        .with_prop("isOptional", json!(optional));
        if let Some(ty) = param.child_by_field_name("type") {
            param_node = param_node.with_prop("type", json!(type_annotation_text(ty, extract.source())));
        }
        let param_id = extract.push_node(param_node);
        extract.push_rel(Relationship::new(RelType::HasParameter, fn_id, &param_id));
    }
}

// --- classes and interfaces ---

fn handle_class(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        tracing::debug!(file = %extract.path(), "class without a name, skipping");
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::type_qualified(extract.path(), &name);
    let (extends, implements) = heritage_names(node, extract.source());
    let mut class_node = Node::new(
        NodeKind::Class,
        name.clone(),
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_parent(&extract.file_id)
    .with_prop("isExported", json!(ctx.exported))
    .with_prop("isDefaultExport", json!(ctx.default_export))
    .with_prop("isAbstract", json!(node.kind() == "abstract_class_declaration"));
    if let Some(base) = extends.first() {
        class_node = class_node.with_prop("extendsName", json!(base));
    }
    if !implements.is_empty() {
        class_node = class_node.with_prop("implementsNames", json!(implements));
    }
    let class_id = extract.push_node(class_node);
    let file_id = extract.file_id.clone();
    extract.push_rel(Relationship::new(RelType::Contains, &file_id, &class_id));
    extract.push_rel(Relationship::new(RelType::DefinesClass, &file_id, &class_id));
    if ctx.exported {
        extract.push_rel(Relationship::new(RelType::Exports, &file_id, &class_id));
    }

    let mut next = ctx.without_export();
    next.container = Some((qualified.clone(), class_id.clone()));

    if util::is_pascal_case(&name) && has_jsx_descendant(node) {
        let comp_id = emit_component(&name, span, ctx, extract);
        next.component = Some(comp_id);
    }

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_definition" => {
                    handle_method(member, &next, extract, false);
                }
                "public_field_definition" => handle_class_field(member, &next, extract),
                _ => walk_node(member, &next, extract),
            }
        }
    }
}

fn handle_method(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>, is_signature: bool) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = entity_id::method_qualified(&container_qualified, &name);
    let mut method = Node::new(
        NodeKind::Method,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_parent(&container_id)
    .with_prop("visibility", json!(method_visibility(node, extract.source())))
    .with_prop("isStatic", json!(has_keyword_child(node, "static")))
    .with_prop("isAsync", json!(has_keyword_child(node, "async")))
    .with_prop("isSignature", json!(is_signature));
    if !is_signature {
        method = method.with_prop("complexity", json!(cyclomatic_complexity(node)));
    }
    if let Some(ret) = return_type_text(node, extract.source()) {
        method = method.with_prop("returnType", json!(ret));
    }
    if let Some((text, tags)) = jsdoc_for(node, extract.source()) {
        method = method
            .with_prop("documentation", json!(text))
            .with_prop("jsdocTags", json!(tags));
    }
    let method_id = extract.push_node(method);
    extract.push_rel(Relationship::new(
        RelType::HasMethod,
        &container_id,
        &method_id,
    ));
    emit_parameters(node, &method_id, extract);

    let mut next = ctx.without_export();
    next.current_fn = Some(method_id);
    if let Some(body) = node.child_by_field_name("body") {
        walk_node(body, &next, extract);
    }
}

fn handle_class_field(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    // A field initialized with a function-like is extracted as a function.
    if let Some(value) = node.child_by_field_name("value") {
        if is_function_like(value.kind()) {
            walk_node(value, &ctx.without_export(), extract);
            return;
        }
    }
    let qualified = entity_id::method_qualified(&container_qualified, &name);
    let mut prop = Node::new(
        NodeKind::Property,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span_of(node),
    )
    .with_parent(&container_id)
    .with_prop("isStatic", json!(has_keyword_child(node, "static")))
    .with_prop("visibility", json!(method_visibility(node, extract.source())));
    if let Some(ty) = node.child_by_field_name("type") {
        prop = prop.with_prop("type", json!(type_annotation_text(ty, extract.source())));
    }
    let prop_id = extract.push_node(prop);
    extract.push_rel(Relationship::new(
        RelType::HasProperty,
        &container_id,
        &prop_id,
    ));
}

fn handle_interface(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::type_qualified(extract.path(), &name);
    let (extends, _) = heritage_names(node, extract.source());
    let mut iface = Node::new(
        NodeKind::Interface,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span_of(node),
    )
    .with_parent(&extract.file_id)
    .with_prop("isExported", json!(ctx.exported));
    if !extends.is_empty() {
        iface = iface.with_prop("extendsNames", json!(extends));
    }
    let iface_id = extract.push_node(iface);
    let file_id = extract.file_id.clone();
    extract.push_rel(Relationship::new(RelType::Contains, &file_id, &iface_id));
    extract.push_rel(Relationship::new(
        RelType::DefinesInterface,
        &file_id,
        &iface_id,
    ));
    if ctx.exported {
        extract.push_rel(Relationship::new(RelType::Exports, &file_id, &iface_id));
    }

    let mut next = ctx.without_export();
    next.container = Some((qualified, iface_id.clone()));
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_signature" => handle_method(member, &next, extract, true),
                "property_signature" => handle_interface_property(member, &next, extract),
                _ => {}
            }
        }
    }
}

fn handle_interface_property(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let Some((container_qualified, container_id)) = ctx.container.clone() else {
        return;
    };
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::method_qualified(&container_qualified, &name);
    let mut prop = Node::new(
        NodeKind::Property,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span_of(node),
    )
    .with_parent(&container_id)
    .with_prop("isSignature", json!(true));
    if let Some(ty) = node.child_by_field_name("type") {
        prop = prop.with_prop("type", json!(type_annotation_text(ty, extract.source())));
    }
    let prop_id = extract.push_node(prop);
    extract.push_rel(Relationship::new(
        RelType::HasProperty,
        &container_id,
        &prop_id,
    ));
}

fn handle_type_alias(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>, is_enum: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, extract.source());
    if name.is_empty() {
        return;
    }
    let qualified = entity_id::type_qualified(extract.path(), &name);
    let alias = Node::new(
        NodeKind::TypeAlias,
        name,
        &qualified,
        extract.path(),
        extract.file.language,
        span_of(node),
    )
    .with_parent(&extract.file_id)
    .with_prop("isExported", json!(ctx.exported))
    .with_prop("isEnum", json!(is_enum));
    let alias_id = extract.push_node(alias);
    let file_id = extract.file_id.clone();
    extract.push_rel(Relationship::new(RelType::Contains, &file_id, &alias_id));
    if is_enum {
        extract.push_rel(Relationship::new(RelType::DefinesEnum, &file_id, &alias_id));
    }
    if ctx.exported {
        extract.push_rel(Relationship::new(RelType::Exports, &file_id, &alias_id));
    }
}

// --- variables ---

fn handle_variable_statement(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let is_constant = node
        .child(0)
        .map(|c| c.kind() == "const")
        .unwrap_or(false);
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let value = declarator.child_by_field_name("value");
        if let Some(value) = value {
            if is_function_like(value.kind()) {
                // Function bound to a variable; extracted as a Function named
                // after the binding.
                walk_node(value, ctx, extract);
                continue;
            }
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, extract.source());
        if name.is_empty() {
            continue;
        }
        let span = span_of(declarator);
        let qualified = entity_id::variable_qualified(extract.path(), &name, span.start_line);
        let type_text = declarator
            .child_by_field_name("type")
            .map(|ty| type_annotation_text(ty, extract.source()));
        let mut var = Node::new(
            NodeKind::Variable,
            name.clone(),
            &qualified,
            extract.path(),
            extract.file.language,
            span,
        )
        .with_prop("isConstant", json!(is_constant))
        .with_prop("isExported", json!(ctx.exported));
        if let Some(ty) = &type_text {
            var = var.with_prop("type", json!(ty));
        }
        let parent_id = ctx
            .current_fn
            .clone()
            .unwrap_or_else(|| extract.file_id.clone());
        let var_id = extract.push_node(var.with_parent(&parent_id));
        if ctx.current_fn.is_none() {
            let file_id = extract.file_id.clone();
            extract.push_rel(Relationship::new(RelType::Contains, &file_id, &var_id));
            if ctx.exported {
                extract.push_rel(Relationship::new(RelType::Exports, &file_id, &var_id));
            }
        }
        // React.FC-typed variables are components even without a function
        // initializer in this file.
        if util::is_pascal_case(&name) && is_component_type(&type_text) {
            emit_component(&name, span, ctx, extract);
        }
        if let Some(value) = value {
            walk_node(value, &ctx.without_export(), extract);
        }
    }
}

// --- JSX ---

fn handle_jsx_element(node: TsNode<'_>, ctx: &Ctx, extract: &mut Extract<'_>) {
    let (tag_node, attr_holder) = match node.kind() {
        "jsx_element" => {
            let Some(opening) = node.child_by_field_name("open_tag").or_else(|| {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "jsx_opening_element");
                found
            }) else {
                return;
            };
            (opening.child_by_field_name("name"), opening)
        }
        _ => (node.child_by_field_name("name"), node),
    };
    let Some(tag_node) = tag_node else { return };
    let tag = node_text(tag_node, extract.source());
    if tag.is_empty() {
        return;
    }
    let span = span_of(node);
    let qualified = format!(
        "{}:{}:{}:{}",
        extract.path(),
        tag,
        span.start_line,
        span.start_column
    );
    let parent_id = ctx
        .jsx_parent
        .clone()
        .or_else(|| ctx.component.clone())
        .unwrap_or_else(|| extract.file_id.clone());
    let element = Node::new(
        NodeKind::JsxElement,
        tag.clone(),
        &qualified,
        extract.path(),
        extract.file.language,
        span,
    )
    .with_parent(&parent_id)
    .with_prop("tagName", json!(tag));
    let element_id = extract.push_node(element);

    if let Some(source_id) = ctx.jsx_parent.clone().or_else(|| ctx.component.clone()) {
        extract.push_rel(Relationship::new(
            RelType::RendersElement,
            &source_id,
            &element_id,
        ));
    }

    let mut cursor = attr_holder.walk();
    for attr in attr_holder.named_children(&mut cursor) {
        if attr.kind() != "jsx_attribute" {
            continue;
        }
        handle_jsx_attribute(attr, &qualified, &element_id, extract);
    }

    let mut next = ctx.clone();
    next.jsx_parent = Some(element_id);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "jsx_opening_element" || child.kind() == "jsx_closing_element" {
            continue;
        }
        walk_node(child, &next, extract);
    }
}

fn handle_jsx_attribute(
    attr: TsNode<'_>,
    element_qualified: &str,
    element_id: &str,
    extract: &mut Extract<'_>,
) {
    let Some(name_node) = attr.named_child(0) else {
        return;
    };
    let attr_name = node_text(name_node, extract.source());
    if attr_name.is_empty() {
        return;
    }
    let value_text = attr
        .named_child(1)
        .map(|v| unquote(&node_text(v, extract.source())));
    let qualified = format!("{element_qualified}:{attr_name}");
    let mut attr_node = Node::new(
        NodeKind::JsxAttribute,
        attr_name.clone(),
        &qualified,
        extract.path(),
        extract.file.language,
        span_of(attr),
    )
    .with_parent(element_id);
    if let Some(value) = &value_text {
        attr_node = attr_node.with_prop("value", json!(value));
    }
    let attr_id = extract.push_node(attr_node);
    extract.push_rel(Relationship::new(RelType::HasProp, element_id, &attr_id));

    if attr_name == "className" {
        if let Some(value) = value_text {
            emit_tailwind_classes(&value, element_id, extract);
        }
    }
}

fn emit_tailwind_classes(class_value: &str, element_id: &str, extract: &mut Extract<'_>) {
    for token in class_value.split_whitespace() {
        if token.is_empty() || token.contains('{') {
            continue;
        }
        let class_id = entity_id::node_id(NodeKind::TailwindClass, token);
        if extract.tailwind_seen.insert(token.to_string()) {
            let node = Node::new(
                NodeKind::TailwindClass,
                token,
                token,
                extract.path(),
                extract.file.language,
                crate::model::Span::default(),
            );
            extract.push_node(node);
        }
        extract.push_rel(Relationship::new(
            RelType::UsesTailwindClass,
            element_id,
            &class_id,
        ));
    }
}

// --- shared syntax helpers (also used by the Pass-2 resolver) ---

pub fn is_function_like(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "generator_function"
            | "arrow_function"
    )
}

pub fn first_identifier(node: TsNode<'_>, source: &str) -> Option<String> {
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

pub fn has_keyword_child(node: TsNode<'_>, keyword: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == keyword {
            return true;
        }
    }
    false
}

fn type_annotation_text(node: TsNode<'_>, source: &str) -> String {
    node_text(node, source)
        .trim_start_matches(':')
        .trim()
        .to_string()
}

pub fn return_type_text(node: TsNode<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("return_type")
        .map(|n| type_annotation_text(n, source))
        .filter(|t| !t.is_empty())
}

fn is_component_type(type_text: &Option<String>) -> bool {
    match type_text {
        Some(text) => COMPONENT_RETURN_TYPES
            .iter()
            .any(|candidate| text.contains(candidate)),
        None => false,
    }
}

pub fn has_jsx_descendant(node: TsNode<'_>) -> bool {
    if node.kind().starts_with("jsx_") {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if has_jsx_descendant(child) {
            return true;
        }
    }
    false
}

fn method_visibility(node: TsNode<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "accessibility_modifier" {
            return node_text(child, source);
        }
    }
    "public".to_string()
}

fn heritage_names(node: TsNode<'_>, source: &str) -> (Vec<String>, Vec<String>) {
    let mut extends = Vec::new();
    let mut implements = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "class_heritage" => {
                let mut inner = child.walk();
                for clause in child.named_children(&mut inner) {
                    match clause.kind() {
                        "extends_clause" => collect_heritage(clause, source, &mut extends),
                        "implements_clause" => collect_heritage(clause, source, &mut implements),
                        _ => {}
                    }
                }
            }
            "extends_type_clause" | "extends_clause" => {
                collect_heritage(child, source, &mut extends)
            }
            "implements_clause" => collect_heritage(child, source, &mut implements),
            _ => {}
        }
    }
    (extends, implements)
}

fn collect_heritage(clause: TsNode<'_>, source: &str, out: &mut Vec<String>) {
    let mut cursor = clause.walk();
    for target in clause.named_children(&mut cursor) {
        match target.kind() {
            "identifier" | "nested_identifier" | "type_identifier" | "member_expression"
            | "nested_type_identifier" => {
                let text = node_text(target, source);
                if !text.is_empty() {
                    out.push(text);
                }
            }
            "generic_type" => {
                if let Some(name) = target.child_by_field_name("name") {
                    let text = node_text(name, source);
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Cyclomatic complexity: 1 plus one per branching construct or
/// short-circuiting operator.
pub fn cyclomatic_complexity(node: TsNode<'_>) -> i64 {
    let mut complexity = 1;
    count_branches(node, &mut complexity);
    complexity
}

fn count_branches(node: TsNode<'_>, complexity: &mut i64) {
    match node.kind() {
        "if_statement" | "for_statement" | "for_in_statement" | "while_statement"
        | "do_statement" | "switch_case" | "catch_clause" | "ternary_expression" => {
            *complexity += 1;
        }
        "binary_expression" => {
            let has_logical = {
                let mut found = false;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if matches!(child.kind(), "&&" | "||" | "??") {
                        found = true;
                        break;
                    }
                }
                found
            };
            if has_logical {
                *complexity += 1;
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        count_branches(child, complexity);
    }
}

fn jsdoc_for(node: TsNode<'_>, source: &str) -> Option<(String, Vec<String>)> {
    // The doc comment may sit above the export statement wrapping the node.
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let prev = anchor.prev_named_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let raw = node_text(prev, source);
    if !raw.starts_with("/**") {
        return None;
    }
    let mut text_lines = Vec::new();
    let mut tags = Vec::new();
    for line in raw
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
    {
        let cleaned = line.trim().trim_start_matches('*').trim();
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.starts_with('@') {
            tags.push(cleaned.to_string());
        } else {
            text_lines.push(cleaned.to_string());
        }
    }
    Some((text_lines.join("\n"), tags))
}

/// Extra properties helper so resolvers can stamp call-site metadata
/// uniformly.
pub fn call_site_props(line: i64, column: i64, awaited: bool, conditional: bool) -> Properties {
    let mut props = Properties::new();
    props.insert("callSiteLine".into(), json!(line));
    props.insert("callSiteColumn".into(), json!(column));
    props.insert("isAwaited".into(), json!(awaited));
    props.insert("isConditional".into(), json!(conditional));
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(path: &str, language: Language, source: &str) -> TsProject {
        let mut project = TsProject::new().unwrap();
        project.add_file(path, language, source.to_string()).unwrap();
        project
    }

    fn extract(project: &TsProject, path: &str) -> SingleFileParseResult {
        let file = project.get(path).unwrap();
        project.extract(file).unwrap()
    }

    #[test]
    fn complexity_counts_branches_and_operators() {
        let source = r#"
function busy(a: number, b: number) {
    if (a > 0) {
        for (const x of [1, 2]) {
            while (b > 0) { b--; }
        }
    }
    return a > 0 && b > 0 ? a : b;
}
"#;
        let project = project_with("/t/a.ts", Language::TypeScript, source);
        let result = extract(&project, "/t/a.ts");
        let func = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Function && n.name == "busy")
            .unwrap();
        // if + for + while + ternary + && = 5, plus the baseline 1.
        assert_eq!(func.properties["complexity"], json!(6));
    }

    #[test]
    fn anonymous_callbacks_get_synthetic_names() {
        let source = "items.forEach((item) => { console.log(item); });\n";
        let project = project_with("/t/cb.ts", Language::TypeScript, source);
        let result = extract(&project, "/t/cb.ts");
        assert!(result
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Function && n.name == "callback_items_forEach_arg0"));
    }

    #[test]
    fn variable_bound_arrow_takes_binding_name() {
        let source = "export const compute = async (n: number) => n * 2;\n";
        let project = project_with("/t/v.ts", Language::TypeScript, source);
        let result = extract(&project, "/t/v.ts");
        let func = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Function && n.name == "compute")
            .expect("function named after binding");
        assert_eq!(func.properties["isExported"], json!(true));
        assert_eq!(func.properties["isAsync"], json!(true));
        // No Variable node for the function binding.
        assert!(!result
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Variable && n.name == "compute"));
    }
}
