use anyhow::Result;
use cartograph::analyzer::{self, AnalyzeOptions};
use cartograph::cli::{self, Command};
use cartograph::config::Config;
use cartograph::rpc;
use cartograph::storage::StoreOverrides;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &config.log_file {
        Some(path) => {
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    builder
                        .with_ansi(false)
                        .with_writer(move || {
                            file.try_clone().expect("log file handle clone")
                        })
                        .init();
                }
                Err(err) => {
                    eprintln!("cartograph: cannot open LOG_FILE {}: {err}", path.display());
                    tracing_subscriber::fmt()
                        .with_env_filter(EnvFilter::new(config.log_level.clone()))
                        .with_target(false)
                        .init();
                }
            }
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::get();
    init_logging(config);

    let args = cli::Args::parse();
    match args.command {
        Command::Analyze {
            directory,
            extensions,
            ignore,
            update_schema,
            reset_db,
            neo4j_url,
            neo4j_user,
            neo4j_password,
            neo4j_database,
        } => {
            let options = AnalyzeOptions {
                extensions,
                ignore,
                update_schema,
                reset_db,
                store: StoreOverrides {
                    url: neo4j_url,
                    user: neo4j_user,
                    password: neo4j_password,
                    database: neo4j_database,
                },
            };
            match analyzer::analyze(&directory, &options).await {
                Ok(stats) => {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(error = %err, "analysis failed");
                    std::process::exit(1);
                }
            }
        }
        Command::RpcServe => rpc::serve().await,
    }
}
