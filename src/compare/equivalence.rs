use std::collections::HashSet;

use crate::compare::normalize::normalize_table;
use crate::compare::table::ResultTable;
use crate::compare::value::CellValue;

// Stand-in for NULL when rows are collected into sets; the control byte
// cannot appear in executor-produced text.
const NULL_SENTINEL: &str = "\u{1}<null>";

fn fill_nulls(table: &ResultTable) -> ResultTable {
    let mut filled = table.clone();
    for col in &mut filled.columns {
        for v in &mut col.values {
            if matches!(v, CellValue::Null) {
                *v = CellValue::Text(NULL_SENTINEL.to_string());
            }
        }
    }
    filled
}

fn row_set(table: &ResultTable) -> HashSet<Vec<CellValue>> {
    (0..table.n_rows()).map(|i| table.row(i)).collect()
}

/// Decides whether two result tables hold the same data, ignoring row order,
/// duplicate rows, and column order. Column naming is not ignored: the two
/// tables must expose the same set of column names. The SQL strings are used
/// only to honor an explicit ORDER BY during normalization.
pub fn tables_equivalent(
    gold: &ResultTable,
    generated: &ResultTable,
    sql_gold: Option<&str>,
    sql_generated: Option<&str>,
    decimal_points: u32,
) -> bool {
    let gold = normalize_table(gold, sql_gold);
    let generated = normalize_table(generated, sql_generated);

    let gold_names: HashSet<&str> = gold.column_names().into_iter().collect();
    let gen_names: HashSet<&str> = generated.column_names().into_iter().collect();
    if gold_names != gen_names {
        return false;
    }

    // Normalization may have trailed ORDER BY columns differently on each
    // side, so reindex both to plain alphabetical order before comparing.
    let gold = fill_nulls(&gold.sort_columns_by_name().round_floats(decimal_points));
    let generated = fill_nulls(&generated.sort_columns_by_name().round_floats(decimal_points));

    row_set(&gold) == row_set(&generated)
}
