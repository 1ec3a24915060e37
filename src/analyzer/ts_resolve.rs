//! TypeScript / JavaScript cross-file resolution (Pass 2).
//!
//! Works against the shared [`TsProject`] trees and the merged node index:
//! resolves import declarations to files and exported declarations, heritage
//! clauses, call and assignment targets inside function bodies, try/catch
//! handlers, and JSX component usage.

use serde_json::json;
use tree_sitter::Node as TsNode;

use crate::analyzer::merge::NodeIndex;
use crate::analyzer::typescript::{
    call_site_props, function_like_name, is_function_like, TsFile, TsProject,
};
use crate::entity_id;
use crate::model::{Node, NodeKind, RelType, Relationship};
use crate::util::{node_text, span_of, unquote};

const RESOLUTION_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];
const EXPORT_KIND_ORDER: &[NodeKind] = &[
    NodeKind::Function,
    NodeKind::Class,
    NodeKind::Interface,
    NodeKind::Variable,
];
const CALL_KIND_ORDER: &[NodeKind] = &[
    NodeKind::Function,
    NodeKind::Class,
    NodeKind::Component,
    NodeKind::Variable,
];

pub fn resolve_project(project: &TsProject, index: &NodeIndex<'_>) -> Vec<Relationship> {
    let mut out = Vec::new();
    for file in project.files() {
        let mut resolver = FileResolver::new(project, index, file);
        resolver.run();
        out.extend(resolver.out);
    }
    out
}

#[derive(Debug, Clone)]
enum Imported {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone)]
struct ImportBinding {
    local: String,
    imported: Imported,
    specifier: String,
    /// Resolved in-project file path, when the specifier points inside the
    /// analyzed set.
    resolved_path: Option<String>,
}

#[derive(Clone, Default)]
struct Scope {
    fn_id: Option<String>,
    container_qualified: Option<String>,
    component_id: Option<String>,
}

struct FileResolver<'a, 'n> {
    project: &'a TsProject,
    index: &'a NodeIndex<'n>,
    file: &'a TsFile,
    file_id: String,
    bindings: Vec<ImportBinding>,
    out: Vec<Relationship>,
}

impl<'a, 'n> FileResolver<'a, 'n> {
    fn new(project: &'a TsProject, index: &'a NodeIndex<'n>, file: &'a TsFile) -> Self {
        let file_id = entity_id::node_id(NodeKind::File, &file.norm_path);
        FileResolver {
            project,
            index,
            file,
            file_id,
            bindings: Vec::new(),
            out: Vec::new(),
        }
    }

    fn source(&self) -> &str {
        &self.file.source
    }

    fn run(&mut self) {
        let root = self.file.tree.root_node();
        self.collect_imports(root);
        self.resolve_inheritance();
        self.walk(root, &Scope::default());
    }

    // --- module resolution ---

    fn collect_imports(&mut self, root: TsNode<'_>) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let stmt = match child.kind() {
                "import_statement" => child,
                "export_statement" => continue,
                _ => continue,
            };
            self.resolve_import_statement(stmt);
        }
    }

    fn resolve_import_statement(&mut self, stmt: TsNode<'_>) {
        let Some(source_node) = stmt.child_by_field_name("source") else {
            return;
        };
        let specifier = unquote(&node_text(source_node, self.source()));
        if specifier.is_empty() {
            return;
        }
        let line = span_of(stmt).start_line;
        let resolved_path = resolve_module_specifier(&specifier, &self.file.norm_path, self.project);

        // File -> File import edge; placeholder when the target file is
        // outside the analyzed set.
        let (target_file_id, resolved) = match &resolved_path {
            Some(path) => (entity_id::node_id(NodeKind::File, path), true),
            None => (entity_id::node_id(NodeKind::File, &specifier), false),
        };
        let mut rel = Relationship::new(RelType::Imports, &self.file_id.clone(), &target_file_id)
            .with_prop("moduleSpecifier", json!(specifier))
            .with_prop("isCrossFile", json!(true));
        if !resolved {
            rel = rel.placeholder();
        }
        self.out.push(rel);

        // The Pass-1 Import node is located by reconstructing its id.
        let import_qualified =
            entity_id::import_qualified(&self.file.norm_path, &specifier, line);
        let import_id = entity_id::node_id(NodeKind::Import, &import_qualified);
        let import_known = self.index.contains(&import_id);

        let mut bindings = Vec::new();
        let mut cursor = stmt.walk();
        for child in stmt.named_children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut inner = child.walk();
            for part in child.named_children(&mut inner) {
                match part.kind() {
                    "identifier" => bindings.push(ImportBinding {
                        local: node_text(part, self.source()),
                        imported: Imported::Default,
                        specifier: specifier.clone(),
                        resolved_path: resolved_path.clone(),
                    }),
                    "namespace_import" => {
                        if let Some(local) =
                            crate::analyzer::typescript::first_identifier(part, self.source())
                        {
                            bindings.push(ImportBinding {
                                local,
                                imported: Imported::Namespace,
                                specifier: specifier.clone(),
                                resolved_path: resolved_path.clone(),
                            });
                        }
                    }
                    "named_imports" => {
                        let mut specs = part.walk();
                        for spec in part.named_children(&mut specs) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name) = spec
                                .child_by_field_name("name")
                                .map(|n| node_text(n, self.source()))
                            else {
                                continue;
                            };
                            let local = spec
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, self.source()))
                                .unwrap_or_else(|| name.clone());
                            bindings.push(ImportBinding {
                                local,
                                imported: Imported::Named(name),
                                specifier: specifier.clone(),
                                resolved_path: resolved_path.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        if import_known {
            for binding in &bindings {
                if let Some(target) = self.resolve_binding_target(binding, EXPORT_KIND_ORDER) {
                    self.out.push(
                        Relationship::new(RelType::ResolvesImport, &import_id, &target.entity_id)
                            .with_prop("importedName", json!(binding.local))
                            .with_prop("targetKind", json!(target.kind.label()))
                            .with_prop("isCrossFile", json!(true)),
                    );
                }
            }
        }

        self.bindings.extend(bindings);
    }

    /// Exported declaration a binding points at, if the index knows one.
    fn resolve_binding_target(
        &self,
        binding: &ImportBinding,
        kind_order: &[NodeKind],
    ) -> Option<&'n Node> {
        let path = binding.resolved_path.as_deref()?;
        match &binding.imported {
            Imported::Namespace => self.index.file_node(path),
            Imported::Default => kind_order
                .iter()
                .chain([NodeKind::Component].iter())
                .find_map(|kind| {
                    self.index
                        .nodes_in_file(path)
                        .find(|n| n.kind == *kind && n.prop_bool("isDefaultExport"))
                }),
            Imported::Named(name) => find_export(self.index, path, name, kind_order),
        }
    }

    // --- inheritance ---

    fn resolve_inheritance(&mut self) {
        let nodes: Vec<&Node> = self
            .index
            .nodes_in_file(&self.file.norm_path)
            .filter(|n| matches!(n.kind, NodeKind::Class | NodeKind::Interface))
            .collect();
        for node in nodes {
            if let Some(base) = node.prop_str("extendsName").map(str::to_string) {
                self.emit_heritage(node, &base, RelType::Extends);
            }
            if let Some(bases) = node.properties.get("extendsNames").and_then(|v| v.as_array())
            {
                for base in bases.iter().filter_map(|v| v.as_str()) {
                    self.emit_heritage(node, base, RelType::Extends);
                }
            }
            if let Some(names) = node
                .properties
                .get("implementsNames")
                .and_then(|v| v.as_array())
            {
                for base in names.iter().filter_map(|v| v.as_str()) {
                    self.emit_heritage(node, base, RelType::Implements);
                }
            }
        }
    }

    fn emit_heritage(&mut self, source: &Node, base_name: &str, rel_type: RelType) {
        let kinds: &[NodeKind] = match rel_type {
            RelType::Implements => &[NodeKind::Interface, NodeKind::Class],
            _ => &[NodeKind::Class, NodeKind::Interface],
        };
        let rel = match self.resolve_symbol(base_name, kinds) {
            Some(target) => Relationship::new(rel_type, &source.entity_id, &target.entity_id)
                .with_prop("targetName", json!(base_name))
                .with_prop(
                    "isCrossFile",
                    json!(target.file_path != self.file.norm_path),
                ),
            None => {
                let placeholder_kind = kinds[0];
                let target_id = entity_id::node_id(placeholder_kind, base_name);
                Relationship::new(rel_type, &source.entity_id, &target_id)
                    .with_prop("targetName", json!(base_name))
                    .placeholder()
            }
        };
        self.out.push(rel);
    }

    // --- body walk: calls, mutations, error handling, component usage ---

    fn walk(&mut self, node: TsNode<'_>, scope: &Scope) {
        match node.kind() {
            "import_statement" => {}
            "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source()))
                    .unwrap_or_default();
                let mut next = scope.clone();
                if !name.is_empty() {
                    next.container_qualified =
                        Some(entity_id::type_qualified(&self.file.norm_path, &name));
                    let comp_id = entity_id::node_id(
                        NodeKind::Component,
                        &entity_id::type_qualified(&self.file.norm_path, &name),
                    );
                    if self.index.contains(&comp_id) {
                        next.component_id = Some(comp_id);
                    }
                }
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, &next);
                }
            }
            "method_definition" => {
                let mut next = scope.clone();
                if let (Some(container), Some(name_node)) = (
                    scope.container_qualified.clone(),
                    node.child_by_field_name("name"),
                ) {
                    let name = node_text(name_node, self.source());
                    if !name.is_empty() {
                        let qualified = entity_id::method_qualified(&container, &name);
                        next.fn_id = Some(entity_id::node_id(NodeKind::Method, &qualified));
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body, &next);
                }
            }
            kind if is_function_like(kind) => {
                let name = function_like_name(node, self.source());
                let line = span_of(node).start_line;
                let qualified =
                    entity_id::function_qualified(&self.file.norm_path, &name, line);
                let mut next = scope.clone();
                next.fn_id = Some(entity_id::node_id(NodeKind::Function, &qualified));
                let comp_id = entity_id::node_id(
                    NodeKind::Component,
                    &entity_id::type_qualified(&self.file.norm_path, &name),
                );
                if self.index.contains(&comp_id) {
                    next.component_id = Some(comp_id);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body, &next);
                }
            }
            "call_expression" => {
                self.handle_call(node, scope);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
            "assignment_expression" => {
                self.handle_assignment(node, scope);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
            "try_statement" => {
                self.handle_try(node, scope);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
            "jsx_element" | "jsx_self_closing_element" => {
                self.handle_jsx_usage(node, scope);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.walk(child, scope);
                }
            }
        }
    }

    fn handle_call(&mut self, node: TsNode<'_>, scope: &Scope) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };
        let callee_text = node_text(callee, self.source());
        if callee_text.is_empty() {
            return;
        }
        let span = span_of(node);
        let source_id = scope.fn_id.clone().unwrap_or_else(|| self.file_id.clone());
        let awaited = is_awaited(node);
        let conditional = is_conditional(node);

        let resolved = self.resolve_call_target(callee, scope);
        let (target_id, target_file, placeholder) = match &resolved {
            Some(target) => (
                target.entity_id.clone(),
                Some(target.file_path.clone()),
                false,
            ),
            None => (
                entity_id::node_id(NodeKind::Function, &callee_text),
                None,
                true,
            ),
        };
        let cross_file = target_file
            .as_deref()
            .map(|path| path != self.file.norm_path)
            .unwrap_or(false);

        let mut rel = Relationship::at_site(RelType::Calls, &source_id, &target_id, span.start_line);
        for (key, value) in call_site_props(span.start_line, span.start_column, awaited, conditional)
        {
            rel.properties.insert(key, value);
        }
        rel = rel
            .with_prop("targetName", json!(callee_text))
            .with_prop("isCrossFile", json!(cross_file));
        if placeholder {
            rel = rel.placeholder();
        }
        self.out.push(rel);
    }

    fn resolve_call_target(&self, callee: TsNode<'_>, scope: &Scope) -> Option<&'n Node> {
        match callee.kind() {
            "identifier" => self.resolve_symbol(&node_text(callee, self.source()), CALL_KIND_ORDER),
            "member_expression" => {
                let object = callee.child_by_field_name("object")?;
                let property = callee.child_by_field_name("property")?;
                let member = node_text(property, self.source());
                if member.is_empty() {
                    return None;
                }
                match object.kind() {
                    "this" => {
                        let container = scope.container_qualified.as_deref()?;
                        let qualified = entity_id::method_qualified(container, &member);
                        self.index
                            .get(&entity_id::node_id(NodeKind::Method, &qualified))
                    }
                    "identifier" => {
                        let object_name = node_text(object, self.source());
                        let binding = self
                            .bindings
                            .iter()
                            .find(|b| b.local == object_name)?;
                        if !matches!(binding.imported, Imported::Namespace) {
                            return None;
                        }
                        let path = binding.resolved_path.as_deref()?;
                        find_export(self.index, path, &member, CALL_KIND_ORDER)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn handle_assignment(&mut self, node: TsNode<'_>, scope: &Scope) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.source());
        if name.is_empty() {
            return;
        }
        let Some(target) = self.resolve_symbol(&name, &[NodeKind::Variable]) else {
            return;
        };
        let span = span_of(node);
        let source_id = scope.fn_id.clone().unwrap_or_else(|| self.file_id.clone());
        self.out.push(
            Relationship::at_site(
                RelType::MutatesState,
                &source_id,
                &target.entity_id,
                span.start_line,
            )
            .with_prop("assignmentLine", json!(span.start_line))
            .with_prop("assignmentColumn", json!(span.start_column))
            .with_prop("targetName", json!(name))
            .with_prop(
                "isCrossFile",
                json!(target.file_path != self.file.norm_path),
            ),
        );
    }

    fn handle_try(&mut self, node: TsNode<'_>, scope: &Scope) {
        let Some(fn_id) = scope.fn_id.clone() else {
            return;
        };
        let Some(handler) = node.child_by_field_name("handler") else {
            return;
        };
        let line = span_of(handler).start_line;
        let binding = handler
            .child_by_field_name("parameter")
            .and_then(|p| crate::analyzer::typescript::first_identifier(p, self.source()));
        // Named catches synthesize a Parameter-kind target; anonymous catches
        // point the edge back at the handling function.
        let target_id = match &binding {
            Some(name) => {
                let qualified = format!("{fn_id}:catch:{name}:{line}");
                entity_id::node_id(NodeKind::Parameter, &qualified)
            }
            None => fn_id.clone(),
        };
        let mut rel = Relationship::at_site(RelType::HandlesError, &fn_id, &target_id, line)
            .with_prop("catchLine", json!(line));
        if let Some(name) = binding {
            rel = rel.with_prop("catchBinding", json!(name));
        }
        self.out.push(rel);
    }

    fn handle_jsx_usage(&mut self, node: TsNode<'_>, scope: &Scope) {
        let Some(component_id) = scope.component_id.clone() else {
            return;
        };
        let tag_node = match node.kind() {
            "jsx_self_closing_element" => node.child_by_field_name("name"),
            _ => {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "jsx_opening_element")
                    .and_then(|o| o.child_by_field_name("name"));
                found
            }
        };
        let Some(tag_node) = tag_node else { return };
        let tag = node_text(tag_node, self.source());
        if !tag
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false)
        {
            return;
        }

        let rel = match self.resolve_component(&tag) {
            Some(target) if target.entity_id != component_id => {
                Relationship::new(RelType::UsesComponent, &component_id, &target.entity_id)
                    .with_prop("targetName", json!(tag))
                    .with_prop(
                        "isCrossFile",
                        json!(target.file_path != self.file.norm_path),
                    )
            }
            Some(_) => return,
            None => {
                let target_id = entity_id::node_id(NodeKind::Component, &tag);
                Relationship::new(RelType::UsesComponent, &component_id, &target_id)
                    .with_prop("targetName", json!(tag))
                    .placeholder()
            }
        };
        self.out.push(rel);
    }

    fn resolve_component(&self, name: &str) -> Option<&'n Node> {
        let local_id = entity_id::node_id(
            NodeKind::Component,
            &entity_id::type_qualified(&self.file.norm_path, name),
        );
        if let Some(node) = self.index.get(&local_id) {
            return Some(node);
        }
        let binding = self.bindings.iter().find(|b| b.local == name)?;
        let path = binding.resolved_path.as_deref()?;
        let target_name = match &binding.imported {
            Imported::Named(original) => original.as_str(),
            _ => name,
        };
        let target_id = entity_id::node_id(
            NodeKind::Component,
            &entity_id::type_qualified(path, target_name),
        );
        self.index.get(&target_id)
    }

    /// §4.5.1-style symbol resolution: local declarations first, then import
    /// bindings followed to the exporting file.
    fn resolve_symbol(&self, name: &str, kind_order: &[NodeKind]) -> Option<&'n Node> {
        for kind in kind_order {
            if let Some(node) = self
                .index
                .nodes_in_file(&self.file.norm_path)
                .find(|n| n.kind == *kind && n.name == name)
            {
                return Some(node);
            }
        }
        let binding = self.bindings.iter().find(|b| b.local == name)?;
        match &binding.imported {
            Imported::Named(original) => {
                let path = binding.resolved_path.as_deref()?;
                find_export(self.index, path, original, kind_order)
            }
            Imported::Default => {
                let path = binding.resolved_path.as_deref()?;
                kind_order.iter().find_map(|kind| {
                    self.index
                        .nodes_in_file(path)
                        .find(|n| n.kind == *kind && n.prop_bool("isDefaultExport"))
                })
            }
            Imported::Namespace => {
                let path = binding.resolved_path.as_deref()?;
                self.index.file_node(path)
            }
        }
    }
}

fn find_export<'n>(
    index: &NodeIndex<'n>,
    file_path: &str,
    name: &str,
    kind_order: &[NodeKind],
) -> Option<&'n Node> {
    for kind in kind_order {
        if let Some(node) = index.nodes_in_file(file_path).find(|n| {
            n.kind == *kind
                && n.name == name
                && (n.prop_bool("isExported") || n.prop_bool("isDefaultExport"))
        }) {
            return Some(node);
        }
    }
    None
}

/// Resolve a module specifier relative to the importing file. Only relative
/// specifiers are attempted; bare specifiers are external packages.
pub fn resolve_module_specifier(
    specifier: &str,
    importer_path: &str,
    project: &TsProject,
) -> Option<String> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let dir = match importer_path.rfind('/') {
        Some(idx) => &importer_path[..idx],
        None => "",
    };
    let joined = join_path(dir, specifier);
    if project.contains(&joined) {
        return Some(joined);
    }
    for ext in RESOLUTION_EXTENSIONS {
        let candidate = format!("{joined}{ext}");
        if project.contains(&candidate) {
            return Some(candidate);
        }
    }
    for ext in RESOLUTION_EXTENSIONS {
        let candidate = format!("{joined}/index{ext}");
        if project.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join_path(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn is_awaited(node: TsNode<'_>) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "await_expression" => return true,
            "parenthesized_expression" => current = parent,
            _ => return false,
        }
    }
    false
}

/// True when an `if`/`switch`/loop/ternary sits between the call and its
/// enclosing function body.
fn is_conditional(node: TsNode<'_>) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "if_statement" | "switch_statement" | "switch_case" | "ternary_expression"
            | "for_statement" | "for_in_statement" | "while_statement" | "do_statement" => {
                return true
            }
            kind if is_function_like(kind) || kind == "method_definition" => return false,
            _ => current = parent,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    #[test]
    fn join_path_collapses_dot_segments() {
        assert_eq!(join_path("/src/app", "./b"), "/src/app/b");
        assert_eq!(join_path("/src/app", "../lib/c"), "/src/lib/c");
    }

    #[test]
    fn bare_specifiers_stay_external() {
        let project = TsProject::new().unwrap();
        assert!(resolve_module_specifier("react", "/src/a.tsx", &project).is_none());
    }

    #[test]
    fn relative_specifiers_try_extensions() {
        let mut project = TsProject::new().unwrap();
        project
            .add_file("/src/b.ts", Language::TypeScript, "export const x = 1;\n".into())
            .unwrap();
        assert_eq!(
            resolve_module_specifier("./b", "/src/a.ts", &project),
            Some("/src/b.ts".to_string())
        );
        assert!(resolve_module_specifier("./missing", "/src/a.ts", &project).is_none());
    }
}
