//! The two-pass analysis pipeline: scan → parse → merge → resolve → write.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use crate::error::AnalyzerError;
use crate::model::{AnalyzeStats, Node, Relationship, SingleFileParseResult};
use crate::storage::{Neo4jStore, StoreConfig, StoreOverrides};
use crate::util;

pub mod c_cpp;
pub mod csharp;
pub mod go;
pub mod java;
pub mod merge;
pub mod python;
pub mod resolve;
pub mod scan;
pub mod sql;
pub mod ts_resolve;
pub mod typescript;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Comma-separated extension override.
    pub extensions: Option<String>,
    /// Extra ignore globs appended to the built-in set.
    pub ignore: Vec<String>,
    /// Re-apply constraints and indexes before writing.
    pub update_schema: bool,
    /// Delete all nodes and relationships before writing.
    pub reset_db: bool,
    pub store: StoreOverrides,
}

/// Everything up to (but excluding) persistence. Exposed separately so the
/// extraction pipeline can be exercised without a running store.
pub struct ExtractionResult {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub scanned: usize,
    pub parsed: usize,
    pub skipped: usize,
}

pub fn run_extraction(
    directory: &Path,
    options: &AnalyzeOptions,
) -> Result<ExtractionResult, AnalyzerError> {
    let scan_options = scan::ScanOptions {
        extensions: options.extensions.clone(),
        ignore: options.ignore.clone(),
    };
    let files = scan::scan_directory(directory, &scan_options)?;
    let scanned = files.len();
    tracing::info!(directory = %directory.display(), files = scanned, "starting analysis");

    // Pass 1. Parsers are constructed once; a failure to load a grammar is an
    // internal error, a failure on a single file only drops that file.
    let mut results: Vec<SingleFileParseResult> = Vec::new();
    let mut parsed = 0usize;
    let mut skipped = 0usize;

    let mut ts_project = typescript::TsProject::new()
        .map_err(|err| AnalyzerError::Internal(format!("typescript grammar: {err}")))?;
    let mut cpp_parser: Option<c_cpp::CppParser> = None;
    let mut java_parser: Option<java::JavaParser> = None;
    let mut csharp_parser: Option<csharp::CSharpParser> = None;
    let mut go_parser: Option<go::GoParser> = None;
    let mut sql_parser: Option<sql::SqlParser> = None;
    let mut python_env: Option<(python::TempWorkspace, python::PythonParser)> = None;

    for file in &files {
        use crate::model::Language::*;
        let outcome: Result<Option<SingleFileParseResult>, AnalyzerError> = match file.language {
            TypeScript | Tsx | JavaScript => {
                // Deferred: the shared project parses now, extraction runs
                // once every TS/JS file is known.
                read_source(file).and_then(|source| {
                    ts_project
                        .add_file(&file.norm_path, file.language, source)
                        .map(|_| None)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
            Python => {
                if python_env.is_none() {
                    let workspace = python::TempWorkspace::create()?;
                    let parser = python::PythonParser::new(&workspace)?;
                    python_env = Some((workspace, parser));
                }
                let (_, parser) = python_env.as_ref().expect("python env initialized");
                parser.parse_file(&file.abs_path).map(Some)
            }
            C | Cpp => {
                if cpp_parser.is_none() {
                    cpp_parser = Some(init_parser(c_cpp::CppParser::new())?);
                }
                let parser = cpp_parser.as_mut().expect("cpp parser initialized");
                read_source(file).and_then(|source| {
                    parser
                        .parse(&file.norm_path, file.language, &source)
                        .map(Some)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
            Java => {
                if java_parser.is_none() {
                    java_parser = Some(init_parser(java::JavaParser::new())?);
                }
                let parser = java_parser.as_mut().expect("java parser initialized");
                read_source(file).and_then(|source| {
                    parser
                        .parse(&file.norm_path, &source)
                        .map(Some)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
            CSharp => {
                if csharp_parser.is_none() {
                    csharp_parser = Some(init_parser(csharp::CSharpParser::new())?);
                }
                let parser = csharp_parser.as_mut().expect("csharp parser initialized");
                read_source(file).and_then(|source| {
                    parser
                        .parse(&file.norm_path, &source)
                        .map(Some)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
            Go => {
                if go_parser.is_none() {
                    go_parser = Some(init_parser(go::GoParser::new())?);
                }
                let parser = go_parser.as_mut().expect("go parser initialized");
                read_source(file).and_then(|source| {
                    parser
                        .parse(&file.norm_path, &source)
                        .map(Some)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
            Sql => {
                if sql_parser.is_none() {
                    sql_parser = Some(init_parser(sql::SqlParser::new())?);
                }
                let parser = sql_parser.as_mut().expect("sql parser initialized");
                read_source(file).and_then(|source| {
                    parser
                        .parse(&file.norm_path, &source)
                        .map(Some)
                        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
                })
            }
        };
        match outcome {
            Ok(Some(result)) => {
                parsed += 1;
                results.push(result);
            }
            Ok(None) => {}
            Err(err) if !err.is_fatal() => {
                tracing::warn!(file = %file.norm_path, error = %err, "file dropped");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    for file in ts_project.files() {
        match ts_project.extract(file) {
            Ok(result) => {
                parsed += 1;
                results.push(result);
            }
            Err(err) => {
                tracing::warn!(file = %file.norm_path, error = %err, "file dropped");
                skipped += 1;
            }
        }
    }

    // Merge, then Pass 2 against the read-only index.
    let (nodes, mut relationships, merge_stats) = merge::merge_results(results);
    tracing::debug!(
        nodes = nodes.len(),
        relationships = relationships.len(),
        intra_file_duplicates = merge_stats.intra_file_node_duplicates,
        cross_file_duplicates = merge_stats.cross_file_node_duplicates,
        "pass 1 merged"
    );

    let outcome = {
        let index = merge::NodeIndex::build(&nodes);
        log_dangling_parents(&index, &nodes);
        resolve::resolve_all(&index, &relationships, &ts_project)
    };
    if !outcome.removed_edge_ids.is_empty() {
        let removed: HashSet<&String> = outcome.removed_edge_ids.iter().collect();
        relationships.retain(|rel| !removed.contains(&rel.entity_id));
    }
    merge::merge_relationships(&mut relationships, outcome.relationships);

    Ok(ExtractionResult {
        nodes,
        relationships,
        scanned,
        parsed,
        skipped,
    })
}

/// Full analysis: extraction followed by batched persistence.
pub async fn analyze(
    directory: &Path,
    options: &AnalyzeOptions,
) -> Result<AnalyzeStats, AnalyzerError> {
    let started = Instant::now();
    let extraction = run_extraction(directory, options)?;

    let store = Neo4jStore::connect(StoreConfig::resolve(&options.store)).await?;
    if options.update_schema {
        store.ensure_schema().await?;
    }
    if options.reset_db {
        store.reset().await?;
    }
    // Nodes commit before any edge batch so placeholder stubs stay rare.
    let nodes_written = store.write_nodes(&extraction.nodes).await?;
    let rels_written = store.write_relationships(&extraction.relationships).await?;
    tracing::info!(
        nodes = nodes_written,
        relationships = rels_written,
        "analysis written"
    );

    Ok(AnalyzeStats {
        scanned: extraction.scanned,
        parsed: extraction.parsed,
        skipped: extraction.skipped,
        nodes: extraction.nodes.len(),
        relationships: extraction.relationships.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

fn init_parser<P>(result: anyhow::Result<P>) -> Result<P, AnalyzerError> {
    result.map_err(|err| AnalyzerError::Internal(format!("parser init: {err}")))
}

fn read_source(file: &scan::ScannedFile) -> Result<String, AnalyzerError> {
    util::read_to_string(&file.abs_path)
        .map_err(|err| AnalyzerError::parser(&file.norm_path, err))
}

fn log_dangling_parents(index: &merge::NodeIndex<'_>, nodes: &[Node]) {
    for node in nodes {
        if let Some(parent_id) = &node.parent_id {
            if !index.contains(parent_id) {
                tracing::debug!(
                    entity_id = %node.entity_id,
                    parent_id = %parent_id,
                    "node kept with dangling parentId"
                );
            }
        }
    }
}
