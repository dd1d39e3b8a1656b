//! InfluxQL Transpiler CLI
//!
//! Command-line interface around the compiler:
//! - Compile query text to a JSON operation graph
//! - List the supported aggregate and selector functions
//! - Generate a default configuration file

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use influxql_transpiler::config::{Config, LoggingConfig};
use influxql_transpiler::graph::{BucketId, FUNCTIONS};
use influxql_transpiler::{CompiledGraph, Transpiler};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "influxql-transpile")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile InfluxQL SELECT statements into dataflow graphs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for listings (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a query and print its operation graph
    Compile {
        /// Query text, one or more `;`-separated SELECT statements
        query: String,
        /// Reference instant for now() (RFC 3339, default: current time)
        #[arg(long, value_parser = parse_now)]
        now: Option<DateTime<Utc>>,
        /// Database for statements whose FROM clause names none
        #[arg(short, long)]
        database: Option<String>,
        /// Retention policy for statements whose FROM clause names none
        #[arg(short, long)]
        retention_policy: Option<String>,
        /// Scan this bucket for every statement instead of the configured mappings
        #[arg(short, long)]
        bucket: Option<String>,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// List supported aggregate and selector functions
    Functions,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Compile {
            query,
            now,
            database,
            retention_policy,
            bucket,
            compact,
        } => {
            if database.is_some() {
                config.transpiler.default_database = database;
            }
            if retention_policy.is_some() {
                config.transpiler.default_retention_policy = retention_policy;
            }
            let now = now.unwrap_or_else(Utc::now);
            tracing::debug!(%now, "Compiling query");

            let graph = compile(&config, &query, now, bucket)?;
            let json = if compact {
                serde_json::to_string(&graph)?
            } else {
                serde_json::to_string_pretty(&graph)?
            };
            println!("{}", json);
        }

        Commands::Functions => match cli.format.as_str() {
            "json" => {
                let rows: Vec<_> = FUNCTIONS
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "name": f.name(),
                            "kind": f.kind(),
                            "preserves_time": f.preserves_time(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            _ => {
                println!("{:<10} {:<10} {}", "NAME", "KIND", "TIME");
                println!("{}", "-".repeat(32));
                for f in FUNCTIONS {
                    let time = if f.preserves_time() { "_time" } else { "_start" };
                    println!("{:<10} {:<10} {}", f.name(), f.kind(), time);
                }
            }
        },

        Commands::Config { output } => {
            let content = influxql_transpiler::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", content);
                }
            }
        }
    }

    Ok(())
}

fn compile(
    config: &Config,
    query: &str,
    now: DateTime<Utc>,
    bucket: Option<String>,
) -> anyhow::Result<CompiledGraph> {
    let settings = config.transpiler_config();
    let graph = match bucket {
        Some(id) => {
            let lookup = move |_: &str, _: Option<&str>| Some(BucketId::new(id.as_str()));
            Transpiler::with_config(lookup, settings).transpile_str(query, now)?
        }
        None => Transpiler::with_config(config.static_buckets(), settings)
            .transpile_str(query, now)?,
    };
    Ok(graph)
}

/// Logs go to stderr so stdout stays valid JSON
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_now(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp {:?}: {}", s, e))
}
