//! JSONL RPC surface exposing the single `run_analyzer` tool.
//!
//! One request per line on stdin, one response per line on stdout. Errors are
//! reported as `isError: true` payloads carrying the serialized failure, and
//! never kill the loop.

use serde::Deserialize;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::analyzer::{self, AnalyzeOptions};
use crate::config::Config;
use crate::error::AnalyzerError;
use crate::storage::StoreOverrides;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunAnalyzerParams {
    directory: Option<PathBuf>,
    extensions: Option<String>,
    ignore: Option<Vec<String>>,
    #[serde(default)]
    update_schema: bool,
    #[serde(default)]
    reset_db: bool,
}

pub async fn serve() -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&line).await;
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }
    Ok(())
}

async fn handle_line(line: &str) -> Value {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return json!({
                "id": Value::Null,
                "isError": true,
                "error": { "kind": "ConfigError", "message": format!("bad request: {err}") },
            });
        }
    };
    match request.method.as_str() {
        "run_analyzer" => run_analyzer(request.id, request.params).await,
        other => json!({
            "id": request.id,
            "isError": true,
            "error": { "kind": "ConfigError", "message": format!("unknown method {other:?}") },
        }),
    }
}

async fn run_analyzer(id: Value, params: Value) -> Value {
    let params: RunAnalyzerParams = match serde_json::from_value(params) {
        Ok(value) => value,
        Err(err) => {
            return error_response(id, &AnalyzerError::Config(format!("bad params: {err}")));
        }
    };
    let directory = match params
        .directory
        .or_else(|| Config::get().default_dir.clone())
    {
        Some(dir) => dir,
        None => {
            return error_response(
                id,
                &AnalyzerError::Config("directory is required (no DEFAULT_DIR set)".into()),
            );
        }
    };
    let options = AnalyzeOptions {
        extensions: params.extensions,
        ignore: params.ignore.unwrap_or_default(),
        update_schema: params.update_schema,
        reset_db: params.reset_db,
        store: StoreOverrides::default(),
    };
    match analyzer::analyze(&directory, &options).await {
        Ok(stats) => json!({
            "id": id,
            "result": {
                "content": format!(
                    "Analyzed {} files: {} nodes, {} relationships in {}ms",
                    stats.parsed, stats.nodes, stats.relationships, stats.duration_ms
                ),
                "stats": stats,
            },
        }),
        Err(err) => error_response(id, &err),
    }
}

fn error_response(id: Value, err: &AnalyzerError) -> Value {
    let kind = match err {
        AnalyzerError::FileSystem { .. } => "FileSystemError",
        AnalyzerError::Parser { .. } => "ParserError",
        AnalyzerError::Config(_) => "ConfigError",
        AnalyzerError::Neo4j { .. } => "Neo4jError",
        AnalyzerError::Internal(_) => "InternalError",
    };
    json!({
        "id": id,
        "isError": true,
        "error": { "kind": kind, "message": err.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_method_is_an_error() {
        let response = handle_line(r#"{"id": 1, "method": "nope", "params": {}}"#).await;
        assert_eq!(response["isError"], json!(true));
        assert_eq!(response["id"], json!(1));
    }

    #[tokio::test]
    async fn missing_directory_is_a_config_error() {
        let response =
            handle_line(r#"{"id": 2, "method": "run_analyzer", "params": {}}"#).await;
        assert_eq!(response["isError"], json!(true));
        assert_eq!(response["error"]["kind"], json!("ConfigError"));
    }
}
