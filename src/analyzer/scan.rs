use anyhow::Result;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::error::AnalyzerError;
use crate::model::Language;
use crate::util;

/// Default extensions analyzed when the caller passes none.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "c", "h", "cpp", "hpp", "cc", "hh", "java", "cs", "go",
    "sql",
];

/// Built-in ignore globs, always active; caller-provided globs are appended.
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "**/.idea/**",
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/coverage/**",
    "**/.next/**",
    "**/.svelte-kit/**",
    "**/.venv/**",
    "**/venv/**",
    "**/env/**",
    "**/__pycache__/**",
    "**/*.pyc",
    "**/bin/**",
    "**/obj/**",
    "**/*.class",
    "**/target/**",
    "**/*.log",
    "**/*.lock",
    "**/*.test.*",
    "**/*.spec.*",
    "**/playwright-report/**",
    "**/public/**",
    ".DS_Store",
];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    /// Forward-slash-normalized absolute path; the `filePath` of all nodes.
    pub norm_path: String,
    pub language: Language,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Comma-separated extension override (leading dots tolerated).
    pub extensions: Option<String>,
    /// Extra ignore globs appended to the built-in set.
    pub ignore: Vec<String>,
}

pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<ScannedFile>, AnalyzerError> {
    if !root.is_dir() {
        return Err(AnalyzerError::FileSystem {
            path: root.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let extensions: Vec<String> = match &options.extensions {
        Some(raw) => parse_extensions(raw),
        None => DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
    };

    let mut overrides = OverrideBuilder::new(root);
    for glob in DEFAULT_IGNORE_GLOBS.iter().map(|s| s.to_string()).chain(
        options.ignore.iter().cloned(),
    ) {
        // Overrides are whitelist patterns; a leading `!` inverts to ignore.
        let pattern = format!("!{glob}");
        overrides
            .add(&pattern)
            .map_err(|err| AnalyzerError::Config(format!("bad ignore glob {glob:?}: {err}")))?;
    }
    let overrides = overrides
        .build()
        .map_err(|err| AnalyzerError::Config(format!("ignore globs: {err}")))?;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "walk error");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(value) => value.to_ascii_lowercase(),
            None => continue,
        };
        if !extensions.iter().any(|candidate| *candidate == ext) {
            continue;
        }
        let Some(language) = Language::from_extension(&ext) else {
            tracing::warn!(path = %path.display(), extension = %ext, "no parser for extension, skipping");
            continue;
        };
        let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        files.push(ScannedFile {
            norm_path: util::normalize_path(&abs),
            abs_path: abs,
            language,
        });
    }
    files.sort_by(|a, b| a.norm_path.cmp(&b.norm_path));
    Ok(files)
}
