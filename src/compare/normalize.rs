use regex::Regex;

use crate::compare::table::ResultTable;

/// One term of an ORDER BY clause, direction defaulting to ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub ascending: bool,
}

/// Parses the first ORDER BY clause of a SQL string into its terms. Takes
/// everything from the keyword to the next statement terminator or
/// end-of-string, splits on commas, strips backticks/quotes and
/// table-qualifier prefixes, and reads a trailing ASC/DESC token. Returns
/// an empty list when no clause is present.
pub fn parse_order_by(sql: &str) -> Vec<OrderTerm> {
    let clause_re = Regex::new(r"(?i)\border\s+by\b([^;]*)").unwrap();
    let clause = match clause_re.captures(sql) {
        Some(caps) => caps[1].to_string(),
        None => return Vec::new(),
    };

    let mut terms = Vec::new();
    for raw in clause.split(',') {
        let mut parts = raw.split_whitespace();
        let Some(first) = parts.next() else { continue };
        let bare = first.trim_matches(|c| c == '`' || c == '"' || c == '\'');
        // Keep only the final dot-separated component, dropping any
        // table or alias qualifier.
        let column = bare.rsplit('.').next().unwrap_or(bare).to_string();
        if column.is_empty() {
            continue;
        }
        let ascending = !parts
            .next()
            .map(|d| d.eq_ignore_ascii_case("DESC"))
            .unwrap_or(false);
        terms.push(OrderTerm { column, ascending });
    }
    terms
}

/// Canonicalizes a result table:
/// 1. removes exact-duplicate rows
/// 2. sorts columns alphabetically by name
/// 3. sorts rows by the SQL's ORDER BY columns when present (those columns
///    move to the end), otherwise by every column left to right ascending
/// 4. disambiguates repeated column names last, so name-based lookups work
///    throughout the sort
///
/// ORDER BY terms naming columns absent from the table are dropped; if none
/// survive, the default full-column sort applies.
pub fn normalize_table(table: &ResultTable, sql: Option<&str>) -> ResultTable {
    let table = table.dedup_rows().sort_columns_by_name();

    let terms: Vec<_> = sql.map(parse_order_by).unwrap_or_default();
    let keys: Vec<(usize, bool)> = terms
        .iter()
        .filter_map(|t| table.column_index(&t.column).map(|i| (i, t.ascending)))
        .collect();

    let sorted = if keys.is_empty() {
        let all: Vec<(usize, bool)> = (0..table.n_cols()).map(|i| (i, true)).collect();
        table.sort_rows_by(&all)
    } else {
        let names: Vec<String> = keys
            .iter()
            .map(|&(i, _)| table.columns[i].name.clone())
            .collect();
        table.sort_rows_by(&keys).move_columns_to_end(&names)
    };

    sorted.disambiguate_column_names()
}
