use thiserror::Error;

/// Maximum number of characters of an underlying parser failure that is kept
/// in the wrapped error message.
pub const PARSER_ERROR_TRUNCATE: usize = 500;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("filesystem error at {path}: {message}")]
    FileSystem { path: String, message: String },

    #[error("parser error in {file}: {message}")]
    Parser { file: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("graph store error ({code}): {message}")]
    Neo4j { code: String, message: String },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl AnalyzerError {
    pub fn filesystem(path: impl Into<String>, err: &std::io::Error) -> Self {
        AnalyzerError::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Wrap a parser failure, truncating noisy backtrace-bearing messages.
    pub fn parser(file: impl Into<String>, err: impl std::fmt::Display) -> Self {
        let mut message = err.to_string();
        if message.len() > PARSER_ERROR_TRUNCATE {
            let mut end = PARSER_ERROR_TRUNCATE;
            while end > 0 && !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        AnalyzerError::Parser {
            file: file.into(),
            message,
        }
    }

    pub fn neo4j(code: impl Into<String>, message: impl Into<String>) -> Self {
        AnalyzerError::Neo4j {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the whole run or only drops a single file.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AnalyzerError::Parser { .. })
    }
}

impl From<neo4rs::Error> for AnalyzerError {
    fn from(err: neo4rs::Error) -> Self {
        AnalyzerError::neo4j("Neo.ClientError", err.to_string())
    }
}
