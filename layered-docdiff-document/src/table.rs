//! Tabular attachments and cell-wise comparison of matched tables.

use layered_docdiff::{simple_tokenize, TokenAligner, TokenDiff};
use serde::{Deserialize, Serialize};

use crate::element::CellLocator;

/// Structured content of a table attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Data rows; each holds one value per column.
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn new<C, R, V>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = V>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Column names followed by every cell, row-major, joined by spaces.
    pub fn flatten(&self) -> String {
        self.columns
            .iter()
            .chain(self.rows.iter().flatten())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every row must be as wide as the header.
    pub fn check_shape(&self) -> Result<(), String> {
        match self
            .rows
            .iter()
            .position(|row| row.len() != self.columns.len())
        {
            Some(idx) => Err(format!(
                "row {} has {} cells for {} columns",
                idx,
                self.rows[idx].len(),
                self.columns.len()
            )),
            None => Ok(()),
        }
    }
}

/// One cell whose tokens differ between two matched tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiff {
    pub row: usize,
    /// Column position in the first table.
    pub column_a: usize,
    /// Column position in the second table, when it has a column of that name.
    pub column_b: Option<usize>,
    pub column_name: String,
    pub diff: TokenDiff,
}

impl CellDiff {
    pub fn locator_a(&self) -> CellLocator {
        CellLocator::new(self.row, self.column_a)
    }

    pub fn locator_b(&self) -> Option<CellLocator> {
        self.column_b.map(|column| CellLocator::new(self.row, column))
    }
}

/// Compare two tables cell by cell.
///
/// Walks the rows both tables have and every column of `a`. The matching
/// column in `b` is found by name; a column `b` lacks compares against an
/// empty cell. Only cells with at least one inserted or deleted token are
/// returned. Ragged tables are rejected with a reason.
pub fn compare_cells(a: &TableData, b: &TableData) -> Result<Vec<CellDiff>, String> {
    a.check_shape()?;
    b.check_shape()?;

    let shared_rows = a.rows.len().min(b.rows.len());
    let mut diffs = Vec::new();

    for row in 0..shared_rows {
        for (column_a, name) in a.columns.iter().enumerate() {
            let column_b = b.column_index(name);
            let left = &a.rows[row][column_a];
            let right = column_b.map_or("", |c| b.rows[row][c].as_str());

            let diff = TokenAligner::align(&simple_tokenize(left), &simple_tokenize(right));
            if diff.has_changes() {
                diffs.push(CellDiff {
                    row,
                    column_a,
                    column_b,
                    column_name: name.clone(),
                    diff,
                });
            }
        }
    }

    Ok(diffs)
}
