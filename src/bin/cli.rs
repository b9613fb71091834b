//! Tagwire CLI
//!
//! Command-line interface for operators:
//! - Run a query against the configured historian
//! - Test the historian connection
//! - List source kinds
//! - Print a default config file

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tagwire::config::Config;
use tagwire::historian::{ExecutionResult, Interval, QueryOptions};
use tagwire::sources::{DataSource, SourceRegistry};

#[derive(Parser)]
#[command(name = "tagwire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Translate restricted SQL into dual-stream historian reads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a query, preset keyword (latest, history) or historian URL
    Query {
        /// Query text
        text: String,
        /// Sampling interval (30s, 1m, 5m, 15m, 30m, 1h, 2h, 6h, 12h, 1d)
        #[arg(short, long)]
        interval: Option<Interval>,
        /// Maximum number of samples
        #[arg(short, long)]
        limit: Option<usize>,
        /// Tag to read when the query names none
        #[arg(short, long)]
        tag: Option<String>,
        /// Skip the instant read
        #[arg(long)]
        single: bool,
    },

    /// Read the latest value of the default tag
    Check,

    /// List registered source kinds
    Sources,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    config.logging.init_subscriber();

    let registry = SourceRegistry::with_builtin();

    match cli.command {
        Commands::Query {
            text,
            interval,
            limit,
            tag,
            single,
        } => {
            let source = build_historian(&registry, &config)?;
            let options = QueryOptions {
                tag,
                limit,
                interval,
                dual: single.then_some(false),
            };

            match source.execute(&text, options).await {
                Ok(result) => match cli.format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                    OutputFormat::Table => print_table(&result),
                },
                Err(e) => {
                    eprintln!("Query failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Check => {
            let source = build_historian(&registry, &config)?;
            match source.test_connection().await {
                Ok(report) => match cli.format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                    OutputFormat::Table => {
                        println!("Connection OK ({} ms)", report.elapsed_ms);
                        println!("  Tag:    {}", report.tag);
                        println!(
                            "  Latest: {}",
                            report.latest_timestamp.as_deref().unwrap_or("no data")
                        );
                    }
                },
                Err(e) => {
                    eprintln!("Connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Sources => match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry.kinds())?),
            OutputFormat::Table => {
                for kind in registry.kinds() {
                    println!("{}", kind);
                }
            }
        },

        Commands::Config { output } => {
            let config = tagwire::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn build_historian(
    registry: &SourceRegistry,
    config: &Config,
) -> Result<Box<dyn DataSource>, Box<dyn std::error::Error>> {
    let settings = serde_json::to_value(&config.historian)?;
    Ok(registry.build("historian", &settings)?)
}

fn print_table(result: &ExecutionResult) {
    let meta = &result.metadata;

    if result.is_empty() {
        println!("No samples for {}.", meta.tag);
    } else {
        println!("{:<5} {:<28} {:<20} {}", "ID", "Timestamp", "Value", "Tag");
        println!("{}", "-".repeat(70));
        for sample in &result.samples {
            println!(
                "{:<5} {:<28} {:<20} {}",
                sample.id,
                sample.timestamp,
                sample.value.to_string(),
                sample.tag
            );
        }
    }

    println!();
    println!(
        "{} samples ({} instant, {} historical) in {} ms [{:?}]",
        meta.total_count,
        meta.real_time_count,
        meta.historical_count,
        meta.execution_time_ms,
        meta.query_type
    );
    if let Some(reason) = &meta.fallback_reason {
        println!("Fallback: {}", reason);
    }
}
