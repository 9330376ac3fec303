//! Hungarian algorithm for optimal rectangular assignment.
//!
//! Solves the minimum-cost bipartite matching between the rows and columns of
//! a [`CostMatrix`] using the shortest-augmenting-path formulation with dual
//! potentials (Kuhn–Munkres, O(n²·m)).
//!
//! For an `n × m` matrix the result assigns `min(n, m)` pairs; when there are
//! more rows than columns the problem is solved on the transpose so the extra
//! rows end up unassigned. Empty matrices are trivial: every row unassigned.
//!
//! # Example
//!
//! ```rust
//! use depthflow_tracking::hungarian::{CostMatrix, solve};
//!
//! let costs = CostMatrix::from_rows(&[
//!     &[4.0, 1.0, 3.0],
//!     &[2.0, 0.0, 5.0],
//!     &[3.0, 2.0, 2.0],
//! ]);
//! let result = solve(&costs);
//! assert_eq!(result.rows, vec![Some(1), Some(0), Some(2)]);
//! assert_eq!(result.cost, 5.0);
//! ```
//!
//! All costs must be finite. Callers that need to forbid a pairing use a
//! large finite sentinel and reject it afterwards (see
//! [`UNMATCHABLE_COST`](crate::UNMATCHABLE_COST)).

use alloc::vec;
use alloc::vec::Vec;

use core::ops::{Index, IndexMut};

/// Dense row-major cost matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// Creates a `rows × cols` matrix filled with `value`.
    pub fn new(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Creates a matrix by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    /// Creates a matrix from row slices. All rows must have equal length.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        assert!(
            rows.iter().all(|r| r.len() == cols),
            "CostMatrix rows must have equal length"
        );
        Self::from_fn(rows.len(), cols, |i, j| rows[i][j])
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns true if the matrix has no cells.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

impl Index<(usize, usize)> for CostMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for CostMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

/// Result of an assignment solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// For each row, the assigned column or `None`.
    pub rows: Vec<Option<usize>>,
    /// Sum of the costs of all assigned pairs.
    pub cost: f64,
}

impl Assignment {
    /// Number of assigned pairs.
    pub fn assigned_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    /// Inverse mapping: for each of `cols` columns, the assigned row or `None`.
    pub fn columns(&self, cols: usize) -> Vec<Option<usize>> {
        let mut out = vec![None; cols];
        for (i, col) in self.rows.iter().enumerate() {
            if let Some(j) = *col
                && j < cols
            {
                out[j] = Some(i);
            }
        }
        out
    }
}

/// Solves the minimum-cost assignment for `costs`.
///
/// Always returns a complete result: `rows.len() == costs.rows()`.
pub fn solve(costs: &CostMatrix) -> Assignment {
    let (n, m) = (costs.rows, costs.cols);
    if costs.is_empty() {
        return Assignment {
            rows: vec![None; n],
            cost: 0.0,
        };
    }

    debug_assert!(
        costs.data.iter().all(|c| c.is_finite()),
        "hungarian::solve requires finite costs"
    );

    let rows = if n <= m {
        solve_wide(n, m, |i, j| costs[(i, j)])
    } else {
        // Solve on the transpose: columns become rows.
        let by_col = solve_wide(m, n, |j, i| costs[(i, j)]);
        let mut rows = vec![None; n];
        for (j, row) in by_col.into_iter().enumerate() {
            if let Some(i) = row {
                rows[i] = Some(j);
            }
        }
        rows
    };

    let cost = rows
        .iter()
        .enumerate()
        .filter_map(|(i, col)| col.map(|j| costs[(i, j)]))
        .sum();

    Assignment { rows, cost }
}

/// Core solve for `n <= m`. Returns, per row, the assigned column.
///
/// Uses 1-based internal indexing; index 0 is the virtual root column.
fn solve_wide(n: usize, m: usize, cost: impl Fn(usize, usize) -> f64) -> Vec<Option<usize>> {
    debug_assert!(n <= m);

    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    // p[j]: row matched to column j (0 = none).
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            // n <= m guarantees an unused column exists; j1 == 0 only on NaN input.
            if j1 == 0 {
                break;
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the alternating path back to the root.
        while j0 != 0 {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
        }
    }

    let mut rows = vec![None; n];
    for j in 1..=m {
        if p[j] != 0 {
            rows[p[j] - 1] = Some(j - 1);
        }
    }
    rows
}
