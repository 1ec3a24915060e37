//! Deterministic entity identifiers.
//!
//! Every node and relationship is keyed by a stable id derived from its kind
//! and a canonical qualified name. Pass 1 and Pass 2 both go through this
//! module, which is what lets the resolvers look a node up by reconstructing
//! the id it must have been given during extraction.

use blake3::Hasher;

use crate::model::{NodeKind, RelType};

fn digest(tag: &str, kind_label: &str, qualified_name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(kind_label.as_bytes());
    hasher.update(b"\x00");
    hasher.update(qualified_name.as_bytes());
    let hash = hasher.finalize();
    format!("{}_{}", tag, &hash.to_hex()[..16])
}

pub fn node_id(kind: NodeKind, qualified_name: &str) -> String {
    digest("ent", kind.label(), qualified_name)
}

pub fn relationship_id(rel_type: RelType, qualified_name: &str) -> String {
    digest("rel", rel_type.label(), qualified_name)
}

/// Class / interface / struct / enum / container-like declarations:
/// `filePath ":" name`.
pub fn type_qualified(file_path: &str, name: &str) -> String {
    format!("{file_path}:{name}")
}

/// Container-like declarations inside a package or namespace:
/// `package "." name`.
pub fn package_qualified(package: &str, name: &str) -> String {
    format!("{package}.{name}")
}

/// Function-likes carry the start line so same-named siblings in one file
/// stay distinct: `filePath ":" name ":" startLine`.
pub fn function_qualified(file_path: &str, name: &str, start_line: i64) -> String {
    format!("{file_path}:{name}:{start_line}")
}

/// Methods are unique within their container, so no line number:
/// `containerQualified "." methodName`.
pub fn method_qualified(container_qualified: &str, name: &str) -> String {
    format!("{container_qualified}.{name}")
}

/// Parameters hang off the owning function's entity id.
pub fn parameter_qualified(function_entity_id: &str, name: &str) -> String {
    format!("{function_entity_id}:{name}")
}

pub fn variable_qualified(file_path: &str, name: &str, start_line: i64) -> String {
    format!("{file_path}:{name}:{start_line}")
}

/// Imports / includes / usings: `filePath ":" specifier ":" startLine`.
pub fn import_qualified(file_path: &str, specifier: &str, start_line: i64) -> String {
    format!("{file_path}:{specifier}:{start_line}")
}

pub fn relationship_qualified(
    source_id: &str,
    target_id: &str,
    site_line: Option<i64>,
) -> String {
    match site_line {
        Some(line) => format!("{source_id}:{target_id}:{line}"),
        None => format!("{source_id}:{target_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic() {
        let a = node_id(NodeKind::Function, "/src/a.ts:funcA:2");
        let b = node_id(NodeKind::Function, "/src/a.ts:funcA:2");
        assert_eq!(a, b);
    }

    #[test]
    fn id_format() {
        let id = node_id(NodeKind::File, "/src/a.ts");
        assert!(id.starts_with("ent_"));
        assert_eq!(id.len(), 20);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));

        let rel = relationship_id(RelType::Calls, "ent_a:ent_b:3");
        assert!(rel.starts_with("rel_"));
        assert_eq!(rel.len(), 20);
    }

    #[test]
    fn kind_participates_in_identity() {
        let class = node_id(NodeKind::Class, "/src/a.ts:Shape");
        let interface = node_id(NodeKind::Interface, "/src/a.ts:Shape");
        assert_ne!(class, interface);
    }

    #[test]
    fn qualified_name_participates_in_identity() {
        let one = node_id(NodeKind::Function, "/src/a.ts:run:1");
        let other = node_id(NodeKind::Function, "/src/a.ts:run:40");
        assert_ne!(one, other);
    }

    #[test]
    fn method_rule_has_no_line_number() {
        let container = type_qualified("/src/a.ts", "Impl");
        assert_eq!(method_qualified(&container, "greet"), "/src/a.ts:Impl.greet");
    }

    #[test]
    fn parameter_rule_hangs_off_function_id() {
        let func = node_id(NodeKind::Function, "/src/a.ts:run:1");
        let q = parameter_qualified(&func, "count");
        assert!(q.starts_with("ent_"));
        assert!(q.ends_with(":count"));
    }
}
