use serde::Serialize;
use std::collections::BTreeMap;

use crate::eval::questions::Question;
use crate::llm::GenerationOutcome;

/// Terminal classification of one evaluated question, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    GenerationError(String),
    Timeout(String),
    ExecutionError(String),
    Graded { exact_match: bool, correct: bool },
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Graded { correct: true, .. })
    }
}

/// One output row of an evaluation run, in the flag-column layout the
/// report export expects.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRecord {
    pub db_name: String,
    pub query_category: String,
    pub question: String,
    pub query: String,
    pub generated_query: String,
    pub reason: String,
    pub error_msg: String,
    pub error_query_gen: u8,
    pub error_db_exec: u8,
    pub timeout: u8,
    pub exact_match: u8,
    pub correct: u8,
    pub latency_seconds: f64,
}

impl QuestionRecord {
    pub fn new(question: &Question, outcome: &GenerationOutcome, verdict: Verdict) -> Self {
        let mut record = Self {
            db_name: question.db_name.clone(),
            query_category: question.query_category.clone(),
            question: question.question.clone(),
            query: question.query.clone(),
            generated_query: outcome.query.clone(),
            reason: outcome.rationale.clone(),
            error_msg: String::new(),
            error_query_gen: 0,
            error_db_exec: 0,
            timeout: 0,
            exact_match: 0,
            correct: 0,
            latency_seconds: outcome.latency_seconds,
        };
        match verdict {
            Verdict::GenerationError(msg) => {
                record.error_query_gen = 1;
                record.error_msg = msg;
            }
            Verdict::Timeout(msg) => {
                record.timeout = 1;
                record.error_msg = msg;
            }
            Verdict::ExecutionError(msg) => {
                record.error_db_exec = 1;
                record.error_msg = msg;
            }
            Verdict::Graded {
                exact_match,
                correct,
            } => {
                record.exact_match = exact_match as u8;
                record.correct = correct as u8;
            }
        }
        record
    }
}

/// Per-category aggregate statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub query_category: String,
    pub num_rows: usize,
    pub correct_rate: f64,
    pub error_db_exec_rate: f64,
}

/// Groups records by category and computes counts and rates. The input is
/// expected to be pre-sorted by stable keys; grouping itself is
/// order-insensitive, so the output is deterministic either way.
pub fn aggregate(records: &[QuestionRecord]) -> Vec<CategoryStats> {
    let mut groups: BTreeMap<&str, (usize, usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.query_category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += record.correct as usize;
        entry.2 += record.error_db_exec as usize;
    }
    groups
        .into_iter()
        .map(|(category, (n, correct, errors))| CategoryStats {
            query_category: category.to_string(),
            num_rows: n,
            correct_rate: correct as f64 / n as f64,
            error_db_exec_rate: errors as f64 / n as f64,
        })
        .collect()
}
