//! Optimal one-to-one matching of units across two documents.
//!
//! Similarity scores in `[0, 1]` are turned into integer costs
//! (`1 - similarity`, scaled) and handed to the Kuhn-Munkres solver from
//! `pathfinding`. The solver pairs `min(n, m)` units at minimum total cost;
//! pairs scoring below the threshold are then released back to the
//! unmatched lists.
//!
//! A global assignment avoids the cascade a greedy nearest-match produces when
//! two units are closer to each other than to their true counterparts. Unit
//! counts are page-scale, so the cubic solver is affordable.

use pathfinding::kuhn_munkres::{kuhn_munkres_min, Weights};
use serde::{Deserialize, Serialize};

use crate::errors::{DiffError, DiffResult};

/// Fixed-point scale applied to costs before solving.
const COST_SCALE: f64 = 1_000_000.0;

/// Paired and unpaired units from both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult<U> {
    /// Accepted pairs, ordered by their index on side A.
    pub pairs: Vec<(U, U)>,
    pub unmatched_a: Vec<U>,
    pub unmatched_b: Vec<U>,
}

impl<U> MatchResult<U> {
    /// Every unit unmatched, in input order.
    pub fn all_unmatched(units_a: Vec<U>, units_b: Vec<U>) -> Self {
        Self {
            pairs: Vec::new(),
            unmatched_a: units_a,
            unmatched_b: units_b,
        }
    }

    pub fn total_a(&self) -> usize {
        self.pairs.len() + self.unmatched_a.len()
    }

    pub fn total_b(&self) -> usize {
        self.pairs.len() + self.unmatched_b.len()
    }

    /// Transform every unit while keeping the pairing.
    pub fn map<V, F>(self, mut f: F) -> MatchResult<V>
    where
        F: FnMut(U) -> V,
    {
        MatchResult {
            pairs: self.pairs.into_iter().map(|(a, b)| (f(a), f(b))).collect(),
            unmatched_a: self.unmatched_a.into_iter().map(&mut f).collect(),
            unmatched_b: self.unmatched_b.into_iter().map(&mut f).collect(),
        }
    }
}

/// Dense `rows x columns` similarity scores, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    columns: usize,
    data: Vec<f64>,
}

impl SimilarityMatrix {
    /// Build by calling `score(row, column)` for every cell.
    pub fn from_fn<F>(rows: usize, columns: usize, mut score: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(rows * columns);
        for row in 0..rows {
            for column in 0..columns {
                data.push(score(row, column));
            }
        }
        Self {
            rows,
            columns,
            data,
        }
    }

    /// Build from precomputed rows, e.g. the output of a batched oracle.
    ///
    /// Every row must hold exactly `columns` scores.
    pub fn from_rows(rows: Vec<Vec<f64>>, columns: usize) -> DiffResult<Self> {
        let mut data = Vec::with_capacity(rows.len() * columns);
        let row_count = rows.len();
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != columns {
                return Err(DiffError::DimensionMismatch {
                    row,
                    expected: columns,
                    found: values.len(),
                });
            }
            data.extend(values);
        }
        Ok(Self {
            rows: row_count,
            columns,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.data[row * self.columns + column]
    }

    /// Check that the matrix is `rows x columns`, e.g. after a batched oracle
    /// built it.
    pub fn check_shape(&self, rows: usize, columns: usize) -> DiffResult<()> {
        if self.columns != columns && self.rows > 0 {
            return Err(DiffError::DimensionMismatch {
                row: 0,
                expected: columns,
                found: self.columns,
            });
        }
        if self.rows != rows {
            let row = self.rows.min(rows);
            return Err(DiffError::DimensionMismatch {
                row,
                expected: columns,
                found: if self.rows > rows { self.columns } else { 0 },
            });
        }
        Ok(())
    }

    fn ensure_finite(&self) -> DiffResult<()> {
        match self.data.iter().position(|v| !v.is_finite()) {
            Some(idx) => Err(DiffError::AssignmentInfeasible {
                row: idx / self.columns,
                column: idx % self.columns,
                value: self.data[idx],
            }),
            None => Ok(()),
        }
    }
}

/// Index-level outcome of [`OptimalMatcher::match_matrix`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAssignment {
    /// `(a_index, b_index)` pairs, ascending by `a_index`.
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_a: Vec<usize>,
    pub unmatched_b: Vec<usize>,
}

impl IndexAssignment {
    fn unassigned(rows: usize, columns: usize) -> Self {
        Self {
            pairs: Vec::new(),
            unmatched_a: (0..rows).collect(),
            unmatched_b: (0..columns).collect(),
        }
    }

    /// Move units into a [`MatchResult`] according to this assignment.
    ///
    /// Indices must come from a matrix built over these same unit lists.
    pub fn apply<U>(&self, units_a: Vec<U>, units_b: Vec<U>) -> MatchResult<U> {
        let mut slots_a: Vec<Option<U>> = units_a.into_iter().map(Some).collect();
        let mut slots_b: Vec<Option<U>> = units_b.into_iter().map(Some).collect();

        let pairs = self
            .pairs
            .iter()
            .filter_map(|&(a, b)| Some((slots_a[a].take()?, slots_b[b].take()?)))
            .collect();

        MatchResult {
            pairs,
            unmatched_a: slots_a.into_iter().flatten().collect(),
            unmatched_b: slots_b.into_iter().flatten().collect(),
        }
    }
}

/// Minimum-cost bipartite matcher with a post-filter threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimalMatcher {
    threshold: f64,
}

impl OptimalMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pair `units_a` with `units_b`, scoring every pair with `similarity`.
    ///
    /// The oracle is called `n * m` times and never when either side is empty.
    pub fn match_units<U, F>(
        &self,
        units_a: Vec<U>,
        units_b: Vec<U>,
        mut similarity: F,
    ) -> DiffResult<MatchResult<U>>
    where
        F: FnMut(&U, &U) -> f64,
    {
        if units_a.is_empty() || units_b.is_empty() {
            return Ok(MatchResult::all_unmatched(units_a, units_b));
        }

        let matrix = SimilarityMatrix::from_fn(units_a.len(), units_b.len(), |i, j| {
            similarity(&units_a[i], &units_b[j])
        });
        let assignment = self.match_matrix(&matrix)?;
        Ok(assignment.apply(units_a, units_b))
    }

    /// Solve the assignment over a precomputed matrix.
    pub fn match_matrix(&self, matrix: &SimilarityMatrix) -> DiffResult<IndexAssignment> {
        if matrix.rows == 0 || matrix.columns == 0 {
            return Ok(IndexAssignment::unassigned(matrix.rows, matrix.columns));
        }
        matrix.ensure_finite()?;

        // The solver needs rows <= columns; solve on the transpose otherwise.
        let transposed = matrix.rows > matrix.columns;
        let costs = CostMatrix::from_similarity(matrix, transposed);
        let (_, assignment) = kuhn_munkres_min(&costs);

        let mut candidates: Vec<(usize, usize)> = assignment
            .into_iter()
            .enumerate()
            .map(|(row, column)| if transposed { (column, row) } else { (row, column) })
            .collect();
        candidates.sort_unstable();

        let mut matched_a = vec![false; matrix.rows];
        let mut matched_b = vec![false; matrix.columns];
        let mut pairs = Vec::new();

        for (a, b) in candidates {
            let score = matrix.get(a, b);
            if score >= self.threshold {
                matched_a[a] = true;
                matched_b[b] = true;
                pairs.push((a, b));
            } else {
                tracing::trace!(a, b, score, "assignment below threshold");
            }
        }

        Ok(IndexAssignment {
            pairs,
            unmatched_a: unflagged(&matched_a),
            unmatched_b: unflagged(&matched_b),
        })
    }
}

fn unflagged(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter(|&(_, &set)| !set)
        .map(|(idx, _)| idx)
        .collect()
}

/// Integer cost matrix handed to pathfinding's solver.
struct CostMatrix {
    rows: usize,
    columns: usize,
    data: Vec<i64>,
}

impl CostMatrix {
    fn from_similarity(matrix: &SimilarityMatrix, transposed: bool) -> Self {
        let (rows, columns) = if transposed {
            (matrix.columns, matrix.rows)
        } else {
            (matrix.rows, matrix.columns)
        };

        let mut data = Vec::with_capacity(rows * columns);
        for row in 0..rows {
            for column in 0..columns {
                let score = if transposed {
                    matrix.get(column, row)
                } else {
                    matrix.get(row, column)
                };
                data.push(((1.0 - score.clamp(0.0, 1.0)) * COST_SCALE).round() as i64);
            }
        }

        Self {
            rows,
            columns,
            data,
        }
    }
}

impl Weights<i64> for CostMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row * self.columns + col]
    }

    fn neg(&self) -> Self {
        Self {
            rows: self.rows,
            columns: self.columns,
            data: self.data.iter().map(|&v| -v).collect(),
        }
    }
}
