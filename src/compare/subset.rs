use tracing::debug;

use crate::compare::normalize::normalize_table;
use crate::compare::table::{Column, ResultTable};
use crate::compare::value::CellValue;

fn sorted_values(values: &[CellValue]) -> Vec<CellValue> {
    let mut sorted = values.to_vec();
    sorted.sort();
    sorted
}

/// Decides whether `sub`'s data is wholly contained in `superset`, without
/// relying on column names: each sub column is bound to the first remaining
/// superset column with an identical sorted value sequence, and every
/// superset column can be consumed at most once. Once all sub columns are
/// bound, the restricted superset (renamed to the sub names) and the sub
/// table are both normalized and must match row for row.
///
/// The binding is greedy and first-match with no backtracking; grading
/// expectations were calibrated against that behavior, so it must not be
/// replaced with optimal matching.
pub fn table_subset_of(
    sub: &ResultTable,
    superset: &ResultTable,
    sql_sub: Option<&str>,
    sql_superset: Option<&str>,
    decimal_points: u32,
) -> bool {
    // An empty candidate can never certify containment.
    if sub.is_empty() {
        return false;
    }

    let sub = sub.round_floats(decimal_points).disambiguate_column_names();
    let mut pool = superset
        .round_floats(decimal_points)
        .disambiguate_column_names();

    let mut bound: Vec<Column> = Vec::with_capacity(sub.n_cols());
    for col in &sub.columns {
        let wanted = sorted_values(&col.values);
        let hit = pool.columns.iter().position(|candidate| {
            candidate.values.len() == wanted.len() && sorted_values(&candidate.values) == wanted
        });
        match hit {
            Some(i) => {
                let mut matched = pool.columns.remove(i);
                matched.name = col.name.clone();
                bound.push(matched);
            }
            None => {
                debug!("no match for column {} in superset", col.name);
                return false;
            }
        }
    }

    let restricted = ResultTable::new(bound);
    normalize_table(&sub, sql_sub) == normalize_table(&restricted, sql_superset)
}

#[cfg(test)]
mod tests {
    use super::table_subset_of;
    use crate::compare::table::tests::{int_col, text_col};
    use crate::compare::table::ResultTable;

    fn base() -> ResultTable {
        ResultTable::new(vec![
            int_col("id", &[1, 2, 3]),
            text_col("name", &["a", "b", "c"]),
        ])
    }

    #[test]
    fn empty_candidate_is_rejected() {
        let empty = ResultTable::new(vec![int_col("id", &[])]);
        assert!(!table_subset_of(&empty, &base(), None, None, 2));
        assert!(!table_subset_of(&ResultTable::default(), &base(), None, None, 2));
    }

    #[test]
    fn table_is_subset_of_itself() {
        assert!(table_subset_of(&base(), &base(), None, None, 2));
    }

    #[test]
    fn matching_is_name_independent_but_content_dependent() {
        // One column renamed, one unrelated column added on the super side.
        let wider = ResultTable::new(vec![
            int_col("pk", &[1, 2, 3]),
            text_col("name", &["a", "b", "c"]),
            int_col("noise", &[7, 8, 9]),
        ]);
        assert!(table_subset_of(&base(), &wider, None, None, 2));
    }

    #[test]
    fn missing_content_fails() {
        let wider = ResultTable::new(vec![
            int_col("id", &[1, 2, 4]),
            text_col("name", &["a", "b", "c"]),
        ]);
        assert!(!table_subset_of(&base(), &wider, None, None, 2));
    }

    #[test]
    fn row_count_mismatch_fails() {
        let longer = ResultTable::new(vec![
            int_col("id", &[1, 2, 3, 4]),
            text_col("name", &["a", "b", "c", "d"]),
        ]);
        assert!(!table_subset_of(&base(), &longer, None, None, 2));
    }

    #[test]
    fn superset_column_is_consumed_at_most_once() {
        // Two identical sub columns need two identical super columns.
        let sub = ResultTable::new(vec![int_col("x", &[1, 2]), int_col("y", &[1, 2])]);
        let one = ResultTable::new(vec![int_col("only", &[1, 2])]);
        assert!(!table_subset_of(&sub, &one, None, None, 2));

        let two = ResultTable::new(vec![int_col("p", &[1, 2]), int_col("q", &[1, 2])]);
        assert!(table_subset_of(&sub, &two, None, None, 2));
    }

    #[test]
    fn binding_matches_rowwise_association() {
        // Column contents match individually but the rows pair up
        // differently, which the post-binding normalization catches.
        let sub = ResultTable::new(vec![
            int_col("id", &[1, 2]),
            text_col("name", &["a", "b"]),
        ]);
        let crossed = ResultTable::new(vec![
            int_col("id", &[2, 1]),
            text_col("name", &["a", "b"]),
        ]);
        assert!(!table_subset_of(&sub, &crossed, None, None, 2));
    }

    #[test]
    fn type_tolerant_column_match() {
        let ints = ResultTable::new(vec![int_col("v", &[1, 2])]);
        let floats = ResultTable::new(vec![crate::compare::table::Column::new(
            "w",
            vec![
                crate::compare::value::CellValue::Float(2.0),
                crate::compare::value::CellValue::Float(1.0),
            ],
        )]);
        assert!(table_subset_of(&ints, &floats, None, None, 2));
    }
}
