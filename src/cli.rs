use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cartograph",
    version,
    about = "Builds a code knowledge graph from a multi-language source tree",
    after_help = r#"Examples:
  cartograph analyze ./my-project
  cartograph analyze ./my-project -e .ts,.tsx,.py --update-schema
  cartograph analyze ./my-project -i '**/generated/**' --reset-db
  cartograph rpc-serve
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze a directory and write the graph to Neo4j.
    Analyze {
        /// Directory to analyze.
        directory: PathBuf,
        /// Comma-separated extensions overriding the defaults.
        #[arg(short = 'e', long)]
        extensions: Option<String>,
        /// Additional ignore glob, appended to the built-in set (repeatable).
        #[arg(short = 'i', long = "ignore")]
        ignore: Vec<String>,
        /// Re-apply constraints and indexes before writing.
        #[arg(long)]
        update_schema: bool,
        /// Delete all nodes and relationships before writing.
        #[arg(long)]
        reset_db: bool,
        #[arg(long)]
        neo4j_url: Option<String>,
        #[arg(long)]
        neo4j_user: Option<String>,
        #[arg(long)]
        neo4j_password: Option<String>,
        #[arg(long)]
        neo4j_database: Option<String>,
    },
    /// Serve the run_analyzer tool as JSONL RPC over stdin/stdout.
    RpcServe,
}
