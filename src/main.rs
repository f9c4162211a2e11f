use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod compare;
mod config;
mod db;
mod eval;
mod llm;
mod util;

use crate::config::{AppConfig, CliArgs};
use crate::db::executor::{DuckDbExecutor, QueryExecutor};
use crate::eval::driver::{run_eval, EvalOptions};
use crate::eval::questions::load_questions;
use crate::eval::report::{upload_results, write_csv};
use crate::llm::{GeneratorManager, QueryGenerator};
use crate::util::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Loading questions from {}", args.questions_file.display());
    let mut questions = load_questions(&args.questions_file, config.eval.num_questions)?;
    info!("Loaded {} question(s)", questions.len());

    let executor = Arc::new(DuckDbExecutor::new(&config.database.data_dir));

    // Questions without their own prompt metadata get the live schema of
    // their database, fetched once per database.
    let mut schema_cache: HashMap<String, String> = HashMap::new();
    for question in questions.iter_mut() {
        if !question.table_metadata_string.trim().is_empty() {
            continue;
        }
        if let Some(cached) = schema_cache.get(&question.db_name) {
            question.table_metadata_string = cached.clone();
            continue;
        }
        match executor.table_metadata(&question.db_name).await {
            Ok(metadata) => {
                schema_cache.insert(question.db_name.clone(), metadata.clone());
                question.table_metadata_string = metadata;
            }
            Err(e) => error!("Failed to read schema for {}: {}", question.db_name, e),
        }
    }

    info!("Initializing generator with backend: {}", config.llm.backend);
    let generator: Arc<dyn QueryGenerator> = Arc::new(GeneratorManager::new(
        &config.llm,
        Duration::from_secs(config.eval.timeout_gen_secs),
    )?);

    let options = EvalOptions {
        parallelism: config.eval.parallelism,
        timeout_exec: Duration::from_secs(config.eval.timeout_exec_secs),
        decimal_points: config.eval.decimal_points,
    };
    info!(
        "Evaluating {} question(s) with parallelism {}",
        questions.len(),
        options.parallelism
    );
    let run = run_eval(
        questions,
        generator,
        executor.clone() as Arc<dyn QueryExecutor>,
        options,
    )
    .await;

    for stats in &run.stats {
        info!(
            "{}: {} question(s), correct {:.2}%, execution errors {:.2}%",
            stats.query_category,
            stats.num_rows,
            100.0 * stats.correct_rate,
            100.0 * stats.error_db_exec_rate
        );
    }
    if !run.records.is_empty() {
        let correct: usize = run.records.iter().map(|r| r.correct as usize).sum();
        info!(
            "Average correct rate: {:.2}",
            correct as f64 / run.records.len() as f64
        );
    }

    write_csv(&run.records, &args.output_file)?;
    info!(
        "Wrote {} record(s) to {}",
        run.records.len(),
        args.output_file.display()
    );

    if let Some(url) = &config.eval.upload_url {
        if let Err(e) = upload_results(&run.records, url, &config.llm.model).await {
            error!("Failed to upload results: {}", e);
        }
    }

    Ok(())
}
