use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

use crate::model::Span;

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Absolute, forward-slash-normalized rendering of a path. This is the form
/// stored in `filePath` fields and used in qualified names.
pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut prefix = String::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => {
                prefix = p.as_os_str().to_string_lossy().replace('\\', "/");
            }
            Component::RootDir => {}
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
        }
    }
    format!("{}/{}", prefix, parts.join("/"))
}

pub fn file_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn new_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn span_of(node: tree_sitter::Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_line: start.row as i64 + 1,
        end_line: end.row as i64 + 1,
        start_column: start.column as i64,
        end_column: end.column as i64,
    }
}

pub fn node_text(node: tree_sitter::Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Strip matching quote pairs from a string-literal token.
pub fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\'', '`'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

pub fn is_pascal_case(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
}
