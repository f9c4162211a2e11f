/// Expands a templated query into every concrete query it stands for.
///
/// The template is split into statements on `;`. Within a statement, the
/// first `{a, b, ...}` brace pair is a column-choice placeholder: one query
/// is produced per non-empty combination of the listed tokens, in increasing
/// size order, preserving token order. A bare `GROUP BY {}` in the suffix is
/// rewritten with the same chosen column list. Statements without braces
/// pass through unchanged.
///
/// ```sql
/// SELECT {user.id, user.name} FROM user;
/// ```
/// expands to
/// ```sql
/// SELECT user.id FROM user
/// SELECT user.name FROM user
/// SELECT user.id, user.name FROM user
/// ```
pub fn expand_query(query: &str) -> Vec<String> {
    let mut expanded = Vec::new();
    for statement in query.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        let Some((start, end)) = find_brace_pair(statement) else {
            expanded.push(statement.to_string());
            continue;
        };
        let tokens: Vec<&str> = statement[start + 1..end].split(',').map(str::trim).collect();
        let left = &statement[..start];
        let right = &statement[end + 1..];
        for combination in combinations(tokens.len()) {
            let chosen: Vec<&str> = combination.iter().map(|&i| tokens[i]).collect();
            let column_list = chosen.join(", ");
            let mut suffix = right.to_string();
            if suffix.contains("GROUP BY {}") {
                suffix = suffix.replace("GROUP BY {}", &format!("GROUP BY {}", column_list));
            }
            expanded.push(format!("{}{}{}", left, column_list, suffix));
        }
    }
    expanded
}

fn find_brace_pair(s: &str) -> Option<(usize, usize)> {
    let start = s.find('{')?;
    let end = s[start + 1..].find('}')? + start + 1;
    Some((start, end))
}

/// All non-empty index combinations of `0..n`, size 1 first, lexicographic
/// within each size.
fn combinations(n: usize) -> Vec<Vec<usize>> {
    let mut all = Vec::new();
    for size in 1..=n {
        let mut indices: Vec<usize> = (0..size).collect();
        loop {
            all.push(indices.clone());
            // advance to the next combination of this size
            let mut i = size;
            while i > 0 && indices[i - 1] == i - 1 + n - size {
                i -= 1;
            }
            if i == 0 {
                break;
            }
            indices[i - 1] += 1;
            for j in i..size {
                indices[j] = indices[j - 1] + 1;
            }
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use super::{combinations, expand_query};

    #[test]
    fn plain_statement_passes_through() {
        assert_eq!(
            expand_query("SELECT a FROM t"),
            vec!["SELECT a FROM t".to_string()]
        );
    }

    #[test]
    fn two_column_template() {
        assert_eq!(
            expand_query("SELECT {a, b} FROM t;"),
            vec![
                "SELECT a FROM t".to_string(),
                "SELECT b FROM t".to_string(),
                "SELECT a, b FROM t".to_string(),
            ]
        );
    }

    #[test]
    fn three_columns_yield_seven_queries() {
        let queries = expand_query("SELECT {a,b,c} FROM t");
        assert_eq!(queries.len(), 7);
        assert_eq!(queries[0], "SELECT a FROM t");
        assert_eq!(queries[3], "SELECT a, b FROM t");
        assert_eq!(queries[6], "SELECT a, b, c FROM t");
        // relative token order is preserved in every combination
        assert!(queries.iter().all(|q| {
            let a = q.find('a').unwrap_or(usize::MAX);
            let b = q.find("b").unwrap_or(usize::MAX);
            a == usize::MAX || b == usize::MAX || a < b
        }));
    }

    #[test]
    fn group_by_placeholder_tracks_chosen_columns() {
        let queries = expand_query("SELECT {a, b}, COUNT(*) FROM t GROUP BY {}");
        assert_eq!(queries[0], "SELECT a, COUNT(*) FROM t GROUP BY a");
        assert_eq!(queries[2], "SELECT a, b, COUNT(*) FROM t GROUP BY a, b");
    }

    #[test]
    fn multiple_statements_expand_independently() {
        let queries = expand_query("SELECT a FROM t; SELECT {x, y} FROM u;");
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0], "SELECT a FROM t");
        assert_eq!(queries[1], "SELECT x FROM u");
    }

    #[test]
    fn blank_statements_are_discarded() {
        assert_eq!(expand_query(" ; ;SELECT 1; ").len(), 1);
    }

    #[test]
    fn combination_counts() {
        assert_eq!(combinations(1).len(), 1);
        assert_eq!(combinations(3).len(), 7);
        assert_eq!(combinations(4).len(), 15);
    }
}
