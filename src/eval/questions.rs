use serde::Deserialize;
use std::path::Path;

/// One row of the questions file. `query` is the gold reference SQL, which
/// may carry brace-delimited column choices and multiple statements (see
/// `compare::expand`). `table_metadata_string` is optional prompt context;
/// when blank it is filled from the database schema before the run.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub question: String,
    pub query: String,
    pub db_name: String,
    pub query_category: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub table_metadata_string: String,
    /// Rejected SQL from an earlier run of the same question, forwarded to
    /// the generator so it can avoid repeating the mistake.
    #[serde(default)]
    pub prev_invalid_sql: String,
    #[serde(default)]
    pub prev_error_msg: String,
}

/// Loads questions from a CSV file, optionally capped to the first
/// `num_questions` rows.
pub fn load_questions(
    path: &Path,
    num_questions: Option<usize>,
) -> Result<Vec<Question>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut questions = Vec::new();
    for row in reader.deserialize() {
        let question: Question = row?;
        questions.push(question);
        if num_questions.is_some_and(|n| questions.len() >= n) {
            break;
        }
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::load_questions;
    use std::io::Write;

    fn write_questions_file(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("questions.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "question,query,db_name,query_category,prev_invalid_sql,prev_error_msg")
            .unwrap();
        writeln!(
            f,
            "How many users?,SELECT COUNT(*) FROM users,app,basic,SELECT COUNT(),parse error"
        )
        .unwrap();
        writeln!(f, "List names,SELECT name FROM users,app,basic,,").unwrap();
        path
    }

    #[test]
    fn loads_rows_with_defaults() {
        let dir = std::env::temp_dir().join("sql-grader-questions-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_questions_file(&dir);

        let questions = load_questions(&path, None).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].db_name, "app");
        assert!(questions[0].instructions.is_empty());
        assert_eq!(questions[0].prev_invalid_sql, "SELECT COUNT()");
        assert_eq!(questions[0].prev_error_msg, "parse error");
        assert!(questions[1].prev_invalid_sql.is_empty());

        let capped = load_questions(&path, Some(1)).unwrap();
        assert_eq!(capped.len(), 1);
    }
}
