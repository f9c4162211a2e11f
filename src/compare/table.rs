use std::collections::HashSet;

use crate::compare::value::CellValue;

/// A named column of cell values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// An executed result set, held column-major. Row and column order carry no
/// meaning until the table has been normalized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultTable {
    pub columns: Vec<Column>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns.windows(2).all(|w| w[0].values.len() == w[1].values.len()),
            "ragged columns in result table"
        );
        Self { columns }
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.n_cols() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row(&self, i: usize) -> Vec<CellValue> {
        self.columns.iter().map(|c| c.values[i].clone()).collect()
    }

    /// Removes exact-duplicate rows, keeping the first occurrence.
    pub fn dedup_rows(&self) -> ResultTable {
        let mut seen: HashSet<Vec<CellValue>> = HashSet::new();
        let mut keep = Vec::new();
        for i in 0..self.n_rows() {
            if seen.insert(self.row(i)) {
                keep.push(i);
            }
        }
        self.take_rows(&keep)
    }

    fn take_rows(&self, indices: &[usize]) -> ResultTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        ResultTable { columns }
    }

    /// Stable-sorts rows by the given (column index, ascending) keys.
    pub fn sort_rows_by(&self, keys: &[(usize, bool)]) -> ResultTable {
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by(|&a, &b| {
            for &(col, ascending) in keys {
                let cmp = self.columns[col].values[a].cmp(&self.columns[col].values[b]);
                if !cmp.is_eq() {
                    return if ascending { cmp } else { cmp.reverse() };
                }
            }
            std::cmp::Ordering::Equal
        });
        self.take_rows(&order)
    }

    /// Reorders columns alphabetically by name (byte order).
    pub fn sort_columns_by_name(&self) -> ResultTable {
        let mut columns = self.columns.clone();
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        ResultTable { columns }
    }

    /// Moves the named columns to the end, in the order given, preserving the
    /// relative order of the rest. Names not present are ignored.
    pub fn move_columns_to_end(&self, names: &[String]) -> ResultTable {
        let mut trailing = Vec::new();
        for name in names {
            if let Some(i) = self.column_index(name) {
                if !trailing.contains(&i) {
                    trailing.push(i);
                }
            }
        }
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| !trailing.contains(i))
            .map(|(_, c)| c.clone())
            .collect();
        columns.extend(trailing.iter().map(|&i| self.columns[i].clone()));
        ResultTable { columns }
    }

    /// Renames 2nd-and-later occurrences of a repeated column name by
    /// suffixing the zero-based column position.
    pub fn disambiguate_column_names(&self) -> ResultTable {
        let mut seen: HashSet<String> = HashSet::new();
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let name = if seen.contains(&c.name) {
                    format!("{}_{}", c.name, i)
                } else {
                    c.name.clone()
                };
                seen.insert(c.name.clone());
                Column {
                    name,
                    values: c.values.clone(),
                }
            })
            .collect();
        ResultTable { columns }
    }

    /// Rounds every float cell to the given number of decimal places.
    pub fn round_floats(&self, decimal_points: u32) -> ResultTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: c.values.iter().map(|v| v.rounded(decimal_points)).collect(),
            })
            .collect();
        ResultTable { columns }
    }
}
