use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Root of the per-database directories (`<data_dir>/<db>/<db>.duckdb`).
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // currently "remote"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvalSettings {
    pub parallelism: usize,
    pub timeout_gen_secs: u64,
    pub timeout_exec_secs: u64,
    pub decimal_points: u32,
    pub num_questions: Option<usize>,
    pub upload_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub eval: EvalSettings,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// CSV file of questions to evaluate
    #[arg(short, long, value_name = "FILE")]
    pub questions_file: PathBuf,

    /// Where to write the per-question report CSV
    #[arg(short, long, value_name = "FILE")]
    pub output_file: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the subject databases
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Number of questions evaluated in parallel
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Evaluate only the first N questions
    #[arg(short, long)]
    pub num_questions: Option<usize>,

    /// Per-query execution deadline in seconds
    #[arg(long)]
    pub timeout_exec: Option<u64>,

    /// Decimal places used for float comparison
    #[arg(long)]
    pub decimal_points: Option<u32>,

    /// Upload the report to this URL after the run
    #[arg(long)]
    pub upload_url: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .set_default("database.data_dir", "data")?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "gpt-4o")?
            .set_default("eval.parallelism", 5)?
            .set_default("eval.timeout_gen_secs", 60)?
            .set_default("eval.timeout_exec_secs", 30)?
            .set_default("eval.decimal_points", 2)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/sql-grader/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(data_dir) = &args.data_dir {
            config.database.data_dir = data_dir.clone();
        }
        if let Some(parallelism) = args.parallelism {
            config.eval.parallelism = parallelism;
        }
        if let Some(num_questions) = args.num_questions {
            config.eval.num_questions = Some(num_questions);
        }
        if let Some(timeout_exec) = args.timeout_exec {
            config.eval.timeout_exec_secs = timeout_exec;
        }
        if let Some(decimal_points) = args.decimal_points {
            config.eval.decimal_points = decimal_points;
        }
        if let Some(upload_url) = &args.upload_url {
            config.eval.upload_url = Some(upload_url.clone());
        }

        Ok(config)
    }
}
