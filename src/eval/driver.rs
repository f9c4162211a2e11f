use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info};

use crate::compare::equivalence::tables_equivalent;
use crate::compare::expand::expand_query;
use crate::compare::subset::table_subset_of;
use crate::db::executor::{ExecError, QueryExecutor};
use crate::eval::questions::Question;
use crate::eval::record::{aggregate, CategoryStats, QuestionRecord, Verdict};
use crate::llm::{GenerationRequest, QueryGenerator};

#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Maximum number of questions evaluated in parallel.
    pub parallelism: usize,
    /// Deadline for each individual query execution.
    pub timeout_exec: Duration,
    /// Decimal places used for float comparison.
    pub decimal_points: u32,
}

pub struct EvalRun {
    pub records: Vec<QuestionRecord>,
    pub stats: Vec<CategoryStats>,
}

/// Evaluates every question concurrently and returns the per-question
/// records plus per-category aggregates. One task per question, bounded by
/// a semaphore; each execution owns its own database session, so a timeout
/// on one question never disturbs its siblings. Records are sorted by
/// stable keys afterwards, making the report deterministic regardless of
/// completion order.
pub async fn run_eval(
    questions: Vec<Question>,
    generator: Arc<dyn QueryGenerator>,
    executor: Arc<dyn QueryExecutor>,
    options: EvalOptions,
) -> EvalRun {
    let total = questions.len();
    let semaphore = Arc::new(Semaphore::new(options.parallelism.max(1)));
    let records = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let tried = Arc::new(AtomicUsize::new(0));
    let correct = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(total);
    for question in questions {
        let semaphore = Arc::clone(&semaphore);
        let generator = Arc::clone(&generator);
        let executor = Arc::clone(&executor);
        let records = Arc::clone(&records);
        let tried = Arc::clone(&tried);
        let correct = Arc::clone(&correct);
        let options = options.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let outcome = generator
                .generate(&GenerationRequest {
                    question: question.question.clone(),
                    instructions: question.instructions.clone(),
                    schema: question.table_metadata_string.clone(),
                    prev_invalid_sql: question.prev_invalid_sql.clone(),
                    prev_error_msg: question.prev_error_msg.clone(),
                })
                .await;

            let verdict = if !outcome.error.is_empty() {
                Verdict::GenerationError(outcome.error.clone())
            } else {
                grade_question(&question, &outcome.query, executor.as_ref(), &options).await
            };

            if verdict.is_correct() {
                correct.fetch_add(1, Ordering::SeqCst);
            }
            let done = tried.fetch_add(1, Ordering::SeqCst) + 1;
            let correct_so_far = correct.load(Ordering::SeqCst);
            info!(
                "Correct so far: {}/{} ({:.2}%)",
                correct_so_far,
                done,
                100.0 * correct_so_far as f64 / done as f64
            );

            let record = QuestionRecord::new(&question, &outcome, verdict);
            records.lock().await.push(record);
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Evaluation task failed: {}", e);
        }
    }

    let mut records: Vec<QuestionRecord> = records.lock().await.drain(..).collect();
    records.sort_by(|a, b| {
        (&a.db_name, &a.query_category, &a.question)
            .cmp(&(&b.db_name, &b.query_category, &b.question))
    });
    let stats = aggregate(&records);
    EvalRun { records, stats }
}

/// Executes the generated query and every expansion of the gold query, and
/// grades the results. Exact match requires the equivalence comparator to
/// accept some gold variant; correctness also accepts subset containment of
/// a gold result within the generated one. Execution failures on either
/// side classify the whole question.
async fn grade_question(
    question: &Question,
    generated_sql: &str,
    executor: &dyn QueryExecutor,
    options: &EvalOptions,
) -> Verdict {
    let generated_sql = generated_sql.replace('`', "");

    let generated_table = match executor
        .execute(&generated_sql, &question.db_name, options.timeout_exec)
        .await
    {
        Ok(table) => table,
        Err(e) => return verdict_from_exec_error(e),
    };

    let mut correct = false;
    for gold_sql in expand_query(&question.query) {
        let gold_table = match executor
            .execute(&gold_sql, &question.db_name, options.timeout_exec)
            .await
        {
            Ok(table) => table,
            Err(e) => return verdict_from_exec_error(e),
        };

        if tables_equivalent(
            &gold_table,
            &generated_table,
            Some(&gold_sql),
            Some(&generated_sql),
            options.decimal_points,
        ) {
            return Verdict::Graded {
                exact_match: true,
                correct: true,
            };
        }
        if !correct
            && table_subset_of(
                &gold_table,
                &generated_table,
                Some(&gold_sql),
                Some(&generated_sql),
                options.decimal_points,
            )
        {
            correct = true;
        }
    }

    Verdict::Graded {
        exact_match: false,
        correct,
    }
}

fn verdict_from_exec_error(e: ExecError) -> Verdict {
    match e {
        ExecError::Timeout => Verdict::Timeout(format!("QUERY EXECUTION TIMEOUT: {}", e)),
        ExecError::Database(_) => Verdict::ExecutionError(format!("QUERY EXECUTION ERROR: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::{run_eval, EvalOptions, EvalRun};
    use crate::compare::table::tests::int_col;
    use crate::compare::table::ResultTable;
    use crate::db::executor::{ExecError, QueryExecutor};
    use crate::eval::questions::Question;
    use crate::llm::{GenerationOutcome, GenerationRequest, QueryGenerator};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Maps each question verbatim to a canned candidate query, or fails
    /// generation when the question starts with "genfail".
    struct ScriptedGenerator;

    #[async_trait]
    impl QueryGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
            if request.question.starts_with("genfail") {
                return GenerationOutcome {
                    error: "GENERATION ERROR: scripted".to_string(),
                    ..Default::default()
                };
            }
            GenerationOutcome {
                query: format!("gen:{}", request.question),
                rationale: "scripted".to_string(),
                ..Default::default()
            }
        }
    }

    /// Interprets query strings as instructions: "slow" sleeps past any
    /// deadline, "err" fails, anything else returns a one-column table
    /// whose value is the query's trailing number.
    struct ScriptedExecutor;

    #[async_trait]
    impl QueryExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            query: &str,
            _db_name: &str,
            timeout: Duration,
        ) -> Result<ResultTable, ExecError> {
            if query.contains("slow") {
                tokio::time::sleep(timeout).await;
                return Err(ExecError::Timeout);
            }
            if query.contains("err") {
                return Err(ExecError::Database("scripted failure".to_string()));
            }
            let value = query
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .chars()
                .rev()
                .collect::<String>()
                .parse::<i64>()
                .unwrap_or(0);
            Ok(ResultTable::new(vec![int_col("v", &[value])]))
        }
    }

    fn question(text: &str, gold: &str, category: &str) -> Question {
        Question {
            question: text.to_string(),
            query: gold.to_string(),
            db_name: "db".to_string(),
            query_category: category.to_string(),
            instructions: String::new(),
            table_metadata_string: String::new(),
            prev_invalid_sql: String::new(),
            prev_error_msg: String::new(),
        }
    }

    async fn run(questions: Vec<Question>) -> EvalRun {
        run_eval(
            questions,
            Arc::new(ScriptedGenerator),
            Arc::new(ScriptedExecutor),
            EvalOptions {
                parallelism: 4,
                timeout_exec: Duration::from_millis(50),
                decimal_points: 2,
            },
        )
        .await
    }

    #[tokio::test]
    async fn classifies_each_outcome() {
        let run = run(vec![
            question("match 7", "gold 7", "basic"),
            question("mismatch 8", "gold 9", "basic"),
            question("genfail 1", "gold 1", "basic"),
            question("err", "gold 1", "basic"),
            question("slow", "gold 1", "basic"),
        ])
        .await;

        assert_eq!(run.records.len(), 5);
        let by_question = |q: &str| {
            run.records
                .iter()
                .find(|r| r.question == q)
                .expect("record present")
        };
        let r = by_question("match 7");
        assert_eq!((r.exact_match, r.correct), (1, 1));
        let r = by_question("mismatch 8");
        assert_eq!((r.exact_match, r.correct), (0, 0));
        assert_eq!(by_question("genfail 1").error_query_gen, 1);
        assert_eq!(by_question("err").error_db_exec, 1);
        assert_eq!(by_question("slow").timeout, 1);
    }

    #[tokio::test]
    async fn timeout_does_not_block_siblings() {
        let mut questions = vec![question("slow", "gold 1", "slow")];
        for i in 0..8 {
            questions.push(question(&format!("match {}", i), &format!("gold {}", i), "fast"));
        }
        let run = tokio::time::timeout(Duration::from_secs(5), run(questions))
            .await
            .expect("batch completes despite the stuck question");
        assert_eq!(run.records.len(), 9);
        let fast_correct: usize = run
            .records
            .iter()
            .filter(|r| r.query_category == "fast")
            .map(|r| r.correct as usize)
            .sum();
        assert_eq!(fast_correct, 8);
    }

    /// Records every request it sees, then answers with a fixed query.
    struct CapturingGenerator {
        seen: std::sync::Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl QueryGenerator for CapturingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
            self.seen.lock().unwrap().push(request.clone());
            GenerationOutcome {
                query: "gen 1".to_string(),
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn prior_failure_context_reaches_the_generator() {
        let mut q = question("match 1", "gold 1", "basic");
        q.prev_invalid_sql = "SELECT broken".to_string();
        q.prev_error_msg = "syntax error".to_string();

        let generator = Arc::new(CapturingGenerator {
            seen: std::sync::Mutex::new(Vec::new()),
        });
        run_eval(
            vec![q],
            generator.clone(),
            Arc::new(ScriptedExecutor),
            EvalOptions {
                parallelism: 1,
                timeout_exec: Duration::from_millis(50),
                decimal_points: 2,
            },
        )
        .await;

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prev_invalid_sql, "SELECT broken");
        assert_eq!(seen[0].prev_error_msg, "syntax error");
    }

    #[tokio::test]
    async fn records_are_sorted_by_stable_keys() {
        let run = run(vec![
            question("b", "gold err", "z"),
            question("a", "gold err", "z"),
            question("c", "gold err", "a"),
        ])
        .await;
        let order: Vec<&str> = run.records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn aggregates_per_category() {
        let run = run(vec![
            question("match 1", "gold 1", "easy"),
            question("mismatch 2", "gold 3", "easy"),
            question("err", "gold 1", "hard"),
        ])
        .await;
        assert_eq!(run.stats.len(), 2);
        assert_eq!(run.stats[0].query_category, "easy");
        assert!((run.stats[0].correct_rate - 0.5).abs() < f64::EPSILON);
        assert!((run.stats[1].error_db_exec_rate - 1.0).abs() < f64::EPSILON);
    }
}
