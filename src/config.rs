//! Environment-backed configuration with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_BATCH_SIZE: usize = 100;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    /// Log filter (LOG_LEVEL), e.g. `info` or `cartograph=debug`.
    pub log_level: String,
    /// Optional log file path (LOG_FILE); stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Upsert batch size (STORAGE_BATCH_SIZE); invalid values fall back.
    pub batch_size: usize,
    /// Root for scoped per-run temp directories (TEMP_DIR).
    pub temp_dir: PathBuf,
    /// Default analysis directory (DEFAULT_DIR).
    pub default_dir: Option<PathBuf>,
    pub neo4j_url: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            batch_size: DEFAULT_BATCH_SIZE,
            temp_dir: env::temp_dir(),
            default_dir: None,
            neo4j_url: "bolt://localhost:7687".to_string(),
            neo4j_user: "neo4j".to_string(),
            neo4j_password: "password".to_string(),
            neo4j_database: "neo4j".to_string(),
        }
    }
}

impl Config {
    fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = env::var("LOG_LEVEL") {
            if !val.trim().is_empty() {
                config.log_level = val;
            }
        }
        if let Ok(val) = env::var("LOG_FILE") {
            if !val.trim().is_empty() {
                config.log_file = Some(PathBuf::from(val));
            }
        }
        if let Ok(val) = env::var("STORAGE_BATCH_SIZE") {
            match val.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.batch_size = parsed,
                _ => {
                    tracing::warn!(
                        value = %val,
                        default = DEFAULT_BATCH_SIZE,
                        "invalid STORAGE_BATCH_SIZE, using default"
                    );
                }
            }
        }
        if let Ok(val) = env::var("TEMP_DIR") {
            if !val.trim().is_empty() {
                config.temp_dir = PathBuf::from(val);
            }
        }
        if let Ok(val) = env::var("DEFAULT_DIR") {
            if !val.trim().is_empty() {
                config.default_dir = Some(PathBuf::from(val));
            }
        }
        if let Ok(val) = env::var("NEO4J_URL") {
            if !val.trim().is_empty() {
                config.neo4j_url = val;
            }
        }
        if let Ok(val) = env::var("NEO4J_USER") {
            if !val.trim().is_empty() {
                config.neo4j_user = val;
            }
        }
        if let Ok(val) = env::var("NEO4J_PASSWORD") {
            if !val.trim().is_empty() {
                config.neo4j_password = val;
            }
        }
        if let Ok(val) = env::var("NEO4J_DATABASE") {
            if !val.trim().is_empty() {
                config.neo4j_database = val;
            }
        }

        config
    }

    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}
