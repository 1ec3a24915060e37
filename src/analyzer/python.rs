//! Python extraction via a per-file helper subprocess.
//!
//! A small script walks the standard `ast` module and prints a JSON document;
//! the wrapper validates the shape, maps kinds through the closed vocabulary,
//! and derives all entity ids on this side so the id encoder stays singular.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Config;
use crate::entity_id;
use crate::error::AnalyzerError;
use crate::model::{
    Language, Node, NodeKind, Properties, RelType, Relationship, SingleFileParseResult, Span,
};
use crate::util;

const PARSER_SCRIPT: &str = include_str!("python_parser.py");

/// Scoped per-run temp directory; removed on drop so every exit path cleans
/// up.
pub struct TempWorkspace {
    dir: PathBuf,
}

impl TempWorkspace {
    pub fn create() -> Result<TempWorkspace, AnalyzerError> {
        let dir = Config::get()
            .temp_dir
            .join(format!("cartograph-{}", util::new_instance_id()));
        std::fs::create_dir_all(&dir)
            .map_err(|err| AnalyzerError::filesystem(dir.display().to_string(), &err))?;
        Ok(TempWorkspace { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            tracing::debug!(dir = %self.dir.display(), error = %err, "temp cleanup failed");
        }
    }
}

pub struct PythonParser {
    script_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawParseResult {
    #[serde(rename = "filePath")]
    file_path: String,
    nodes: Vec<RawNode>,
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    r#ref: u64,
    kind: String,
    name: String,
    #[serde(rename = "qualifiedName")]
    qualified_name: Option<String>,
    #[serde(rename = "parentRef")]
    parent_ref: Option<u64>,
    #[serde(rename = "startLine", default)]
    start_line: i64,
    #[serde(rename = "endLine", default)]
    end_line: i64,
    #[serde(rename = "startColumn", default)]
    start_column: i64,
    #[serde(rename = "endColumn", default)]
    end_column: i64,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    kind: String,
    #[serde(rename = "qualifiedName")]
    qualified_name: String,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    r#type: String,
    #[serde(rename = "sourceRef")]
    source_ref: u64,
    #[serde(rename = "targetRef")]
    target_ref: Option<u64>,
    target: Option<RawTarget>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct RawError {
    error: String,
}

impl PythonParser {
    /// Materialize the helper script into the run's temp workspace.
    pub fn new(workspace: &TempWorkspace) -> Result<PythonParser, AnalyzerError> {
        let script_path = workspace.path().join("python_parser.py");
        std::fs::write(&script_path, PARSER_SCRIPT)
            .map_err(|err| AnalyzerError::filesystem(script_path.display().to_string(), &err))?;
        Ok(PythonParser { script_path })
    }

    pub fn parse_file(&self, abs_path: &Path) -> Result<SingleFileParseResult, AnalyzerError> {
        let file_label = abs_path.display().to_string();
        let output = run_python(&self.script_path, abs_path)
            .map_err(|err| AnalyzerError::parser(&file_label, err))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let message = serde_json::from_str::<RawError>(stderr.trim())
                .map(|e| e.error)
                .unwrap_or_else(|_| stderr.trim().to_string());
            return Err(AnalyzerError::parser(&file_label, message));
        }
        if let Ok(raw_error) = serde_json::from_str::<RawError>(stderr.trim()) {
            return Err(AnalyzerError::parser(&file_label, raw_error.error));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw: RawParseResult = serde_json::from_str(stdout.trim())
            .map_err(|err| AnalyzerError::parser(&file_label, format!("bad parser output: {err}")))?;
        if raw.file_path.is_empty() {
            return Err(AnalyzerError::parser(&file_label, "missing filePath"));
        }
        convert(raw, &file_label)
    }
}

fn run_python(script: &Path, file: &Path) -> std::io::Result<std::process::Output> {
    match Command::new("python3").arg(script).arg(file).output() {
        Ok(output) => Ok(output),
        Err(first) if first.kind() == std::io::ErrorKind::NotFound => {
            Command::new("python").arg(script).arg(file).output()
        }
        Err(err) => Err(err),
    }
}

fn convert(raw: RawParseResult, file_label: &str) -> Result<SingleFileParseResult, AnalyzerError> {
    let file_path = raw.file_path;
    let mut result = SingleFileParseResult::new(&file_path);
    let mut ids_by_ref: HashMap<u64, String> = HashMap::new();
    let mut qualified_by_ref: HashMap<u64, String> = HashMap::new();

    for raw_node in raw.nodes {
        let Some(kind) = NodeKind::from_label(&raw_node.kind) else {
            return Err(AnalyzerError::parser(
                file_label,
                format!("unknown node kind {:?}", raw_node.kind),
            ));
        };
        let qualified = match (kind, &raw_node.qualified_name) {
            (NodeKind::PythonParameter, _) => {
                let parent = raw_node
                    .parent_ref
                    .and_then(|r| ids_by_ref.get(&r))
                    .ok_or_else(|| {
                        AnalyzerError::parser(file_label, "parameter without owning function")
                    })?;
                entity_id::parameter_qualified(parent, &raw_node.name)
            }
            (_, Some(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(AnalyzerError::parser(
                    file_label,
                    format!("node {:?} missing qualifiedName", raw_node.name),
                ));
            }
        };

        let span = Span {
            start_line: raw_node.start_line,
            end_line: raw_node.end_line,
            start_column: raw_node.start_column,
            end_column: raw_node.end_column,
        };
        let mut node = Node::new(
            kind,
            raw_node.name,
            &qualified,
            &file_path,
            Language::Python,
            span,
        );
        node.properties = raw_node.properties;
        if let Some(parent_id) = raw_node.parent_ref.and_then(|r| ids_by_ref.get(&r)) {
            node.parent_id = Some(parent_id.clone());
        }
        ids_by_ref.insert(raw_node.r#ref, node.entity_id.clone());
        qualified_by_ref.insert(raw_node.r#ref, qualified);
        result.nodes.push(node);
    }

    for raw_rel in raw.relationships {
        let Some(rel_type) = RelType::from_label(&raw_rel.r#type) else {
            tracing::warn!(file = %file_path, rel = %raw_rel.r#type, "unknown relationship type, dropping");
            continue;
        };
        let Some(source_id) = ids_by_ref.get(&raw_rel.source_ref) else {
            tracing::warn!(file = %file_path, "relationship with dangling source ref, dropping");
            continue;
        };
        let (target_id, placeholder) = match (&raw_rel.target_ref, &raw_rel.target) {
            (Some(target_ref), _) => match ids_by_ref.get(target_ref) {
                Some(id) => (id.clone(), false),
                None => continue,
            },
            (None, Some(target)) => {
                let Some(kind) = NodeKind::from_label(&target.kind) else {
                    continue;
                };
                (entity_id::node_id(kind, &target.qualified_name), true)
            }
            (None, None) => continue,
        };
        let site = raw_rel
            .properties
            .get("line")
            .and_then(Value::as_i64)
            .filter(|line| *line > 0);
        let mut rel = match site {
            Some(line) => Relationship::at_site(rel_type, source_id, &target_id, line),
            None => Relationship::new(rel_type, source_id, &target_id),
        };
        for (key, value) in raw_rel.properties {
            rel.properties.insert(key, value);
        }
        if placeholder {
            rel = rel.placeholder();
        }
        result.relationships.push(rel);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawParseResult {
        serde_json::from_value(serde_json::json!({
            "filePath": "/tmp/demo.py",
            "nodes": [
                {"ref": 0, "kind": "File", "name": "demo.py", "qualifiedName": "/tmp/demo.py",
                 "parentRef": null, "startLine": 1, "endLine": 4, "startColumn": 0, "endColumn": 0,
                 "properties": {}},
                {"ref": 1, "kind": "PythonFunction", "name": "greet",
                 "qualifiedName": "/tmp/demo.py:greet:1", "parentRef": 0,
                 "startLine": 1, "endLine": 2, "startColumn": 0, "endColumn": 10, "properties": {}},
                {"ref": 2, "kind": "PythonParameter", "name": "name", "qualifiedName": null,
                 "parentRef": 1, "startLine": 1, "endLine": 1, "startColumn": 10, "endColumn": 14,
                 "properties": {}}
            ],
            "relationships": [
                {"type": "PYTHON_DEFINES_FUNCTION", "sourceRef": 0, "targetRef": 1,
                 "target": null, "properties": {}},
                {"type": "PYTHON_HAS_PARAMETER", "sourceRef": 1, "targetRef": 2,
                 "target": null, "properties": {}},
                {"type": "PYTHON_CALLS", "sourceRef": 1, "targetRef": null,
                 "target": {"kind": "PythonFunction", "qualifiedName": "print"},
                 "properties": {"calledName": "print", "line": 2}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn converts_refs_to_entity_ids() {
        let result = convert(sample_raw(), "/tmp/demo.py").unwrap();
        assert_eq!(result.nodes.len(), 3);
        let func = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::PythonFunction)
            .unwrap();
        assert_eq!(
            func.entity_id,
            entity_id::node_id(NodeKind::PythonFunction, "/tmp/demo.py:greet:1")
        );
        let param = result
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::PythonParameter)
            .unwrap();
        assert_eq!(param.parent_id.as_deref(), Some(func.entity_id.as_str()));
    }

    #[test]
    fn unresolved_calls_become_placeholders() {
        let result = convert(sample_raw(), "/tmp/demo.py").unwrap();
        let call = result
            .relationships
            .iter()
            .find(|r| r.rel_type == RelType::PythonCalls)
            .unwrap();
        assert!(call.is_placeholder());
        assert_eq!(
            call.target_id,
            entity_id::node_id(NodeKind::PythonFunction, "print")
        );
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let mut raw = sample_raw();
        raw.nodes[1].kind = "Mystery".to_string();
        let err = convert(raw, "/tmp/demo.py").unwrap_err();
        assert!(matches!(err, AnalyzerError::Parser { .. }));
    }
}
